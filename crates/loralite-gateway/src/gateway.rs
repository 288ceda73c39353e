//! The gateway protocol engine.

use rand::RngCore;

use loralite_core::{
    GatewayConfig, KvStore, PhysicalLayer, RadioMediator, SessionInfo, SessionStore,
};
use loralite_proto::{
    scan_regions, DataFrame, DataType, DevEui, JoinAccept, JoinRequest, Region,
};

use crate::{
    error::GatewayError,
    northbound::{GatewayEvent, Northbound},
};

/// Gateway role value.
///
/// Owns the mediator, the session store for the whole device fleet, and
/// the northbound sink.
pub struct Gateway<R: PhysicalLayer, K: KvStore, N: Northbound> {
    config: GatewayConfig,
    sessions: SessionStore<K>,
    mediator: RadioMediator<R>,
    northbound: N,
}

impl<R: PhysicalLayer, K: KvStore, N: Northbound> Gateway<R, K, N> {
    /// Assemble the role from its collaborators.
    pub fn new(config: GatewayConfig, radio: R, kv: K, northbound: N) -> Self {
        let sessions = SessionStore::new(kv, config.app_key.clone());
        let mediator = RadioMediator::new(radio, config.radio);
        Self { config, sessions, mediator, northbound }
    }

    /// Handle to the mediator's received flag for the radio driver side.
    #[must_use]
    pub fn received_flag(&self) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
        self.mediator.received_flag()
    }

    /// Arm the receiver; call once after boot.
    ///
    /// # Errors
    ///
    /// Propagates physical-layer failures.
    pub fn start(&mut self) -> Result<(), GatewayError> {
        self.mediator.start_receive()?;
        Ok(())
    }

    /// Poll for a received frame and process it.
    ///
    /// Frame-level errors are logged and the frame dropped; the receiver
    /// is re-armed either way.
    pub fn poll(&mut self, rng: &mut impl RngCore) {
        let Some(raw) = self.mediator.on_received() else {
            return;
        };

        if let Err(err) = self.handle_frame(&raw, rng) {
            tracing::warn!(error = %err, len = raw.len(), "dropping frame");
        }

        if let Err(err) = self.mediator.start_receive() {
            tracing::warn!(error = %err, "failed to re-arm receiver");
        }
    }

    /// Dispatch one raw frame by length.
    ///
    /// Exactly 22 bytes routes to join handling; longer than 32 routes
    /// to the data pipeline; anything else is unroutable.
    ///
    /// # Errors
    ///
    /// Every error means the frame was dropped without state changes;
    /// see [`GatewayError`].
    pub fn handle_frame(&mut self, raw: &[u8], rng: &mut impl RngCore) -> Result<(), GatewayError> {
        match raw.len() {
            JoinRequest::LEN => self.handle_join_request(raw, rng),
            len if len > 32 => self.handle_data(raw, rng),
            len => Err(GatewayError::UnroutableLength(len)),
        }
    }

    /// Process a join request and, for a new device, answer with a
    /// sealed accept.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::AuthenticationFailed`] on a MIC mismatch
    ///   (dropped silently on the air — no reply hints at the failure).
    /// - [`GatewayError::AlreadyJoined`] for a duplicate join; the
    ///   existing session is left untouched and no accept is emitted.
    fn handle_join_request(
        &mut self,
        raw: &[u8],
        rng: &mut impl RngCore,
    ) -> Result<(), GatewayError> {
        if !JoinRequest::verify_mic(raw, &self.config.hmac_key) {
            tracing::warn!("join request MIC mismatch, ignoring");
            return Err(GatewayError::AuthenticationFailed);
        }

        let request = JoinRequest::decode(raw)?;

        if self.sessions.exists(&request.dev_eui) {
            tracing::info!(dev_eui = %request.dev_eui, "already joined, ignoring join request");
            return Err(GatewayError::AlreadyJoined { dev_eui: request.dev_eui.to_hex() });
        }

        let rnd = rng.next_u32();
        let join_nonce = [rnd as u8, (rnd >> 8) as u8, (rnd >> 16) as u8];
        let dev_addr = rng.next_u32();

        let session = SessionInfo::derive(
            &self.config.app_key,
            dev_addr,
            join_nonce,
            self.config.net_id,
            request.dev_nonce,
        );
        tracing::info!(
            dev_eui = %request.dev_eui,
            dev_addr = %format_args!("{dev_addr:#010x}"),
            "session keys derived"
        );
        self.sessions.store(&request.dev_eui, session);

        let accept = JoinAccept {
            dev_addr,
            join_nonce,
            net_id: self.config.net_id,
            dev_nonce: request.dev_nonce,
        };
        let wire = accept.seal(&self.config.app_key);
        self.mediator.transmit(&wire)?;
        tracing::info!(dev_eui = %request.dev_eui, "join accept sent");

        self.northbound.publish(GatewayEvent::Joined { dev_eui: request.dev_eui, dev_addr });
        Ok(())
    }

    /// The uplink pipeline: parse, resolve session, verify, decrypt,
    /// interpret, acknowledge.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Frame`] on structural parse failure.
    /// - [`GatewayError::UnknownSession`] when the sender has no
    ///   session; no decryption is attempted.
    /// - [`GatewayError::AuthenticationFailed`] on a tag mismatch; the
    ///   session map is left untouched.
    fn handle_data(&mut self, raw: &[u8], rng: &mut impl RngCore) -> Result<(), GatewayError> {
        let frame = DataFrame::decode(raw)?;

        let session = self.sessions.get(&frame.sender).ok_or_else(|| {
            GatewayError::UnknownSession { dev_eui: frame.sender.to_hex() }
        })?;

        if !frame.verify_tag(&self.config.hmac_key) {
            tracing::warn!(sender = %frame.sender, "uplink tag mismatch");
            return Err(GatewayError::AuthenticationFailed);
        }

        let plaintext = frame.decrypt(&session.app_s_key);
        let regions = scan_regions(&plaintext);
        for region in &regions {
            match region {
                Region::Text(text) => tracing::info!(sender = %frame.sender, %text, "uplink text"),
                Region::Bytes(bytes) => tracing::info!(
                    sender = %frame.sender,
                    bytes = %hex::encode(bytes),
                    "uplink bytes"
                ),
                Region::Floats { values, trailing } => {
                    tracing::info!(sender = %frame.sender, ?values, "uplink floats");
                    if *trailing > 0 {
                        tracing::info!(trailing = *trailing, "bytes not forming a whole float");
                    }
                }
                Region::Unknown { tag, data } => {
                    tracing::warn!(
                        tag = %format_args!("{tag:#04x}"),
                        len = data.len(),
                        "unknown region type"
                    );
                }
            }
        }

        self.northbound.publish(GatewayEvent::Uplink { dev_eui: frame.sender, regions });

        // Best-effort: a lost ACK is not an uplink failure.
        if let Err(err) = self.send_ack(&frame.sender, rng) {
            tracing::warn!(error = %err, "failed to send ack");
        }
        Ok(())
    }

    /// Send the literal `"ACK:"` downlink to a device.
    ///
    /// The frame carries the gateway's own EUI as the sender and is
    /// sealed under the recipient's session.
    ///
    /// # Errors
    ///
    /// [`GatewayError::UnknownSession`] for an unjoined recipient; radio
    /// failures propagate.
    pub fn send_ack(&mut self, dst: &DevEui, rng: &mut impl RngCore) -> Result<(), GatewayError> {
        let session = self
            .sessions
            .get(dst)
            .ok_or_else(|| GatewayError::UnknownSession { dev_eui: dst.to_hex() })?;

        let wire = DataFrame::seal(
            &self.config.gateway_eui,
            b"ACK:",
            &session.app_s_key,
            &self.config.hmac_key,
            rng.next_u64(),
        );
        self.mediator.transmit(&wire)?;
        tracing::debug!(dst = %dst, "ack sent");

        self.northbound.publish(GatewayEvent::AckSent { dev_eui: *dst });
        Ok(())
    }

    /// Route a northbound command to a device as a text downlink.
    ///
    /// `dst` is the device's canonical hex EUI, as carried in broker
    /// messages.
    ///
    /// # Errors
    ///
    /// [`GatewayError::UnknownSession`] when `dst` does not parse or
    /// names an unjoined device; radio failures propagate.
    pub fn enqueue_downlink(
        &mut self,
        dst: &str,
        payload: &[u8],
        rng: &mut impl RngCore,
    ) -> Result<(), GatewayError> {
        let dev_eui = DevEui::from_hex(dst)
            .ok_or_else(|| GatewayError::UnknownSession { dev_eui: dst.to_owned() })?;
        let session = self
            .sessions
            .get(&dev_eui)
            .ok_or_else(|| GatewayError::UnknownSession { dev_eui: dev_eui.to_hex() })?;

        let mut plaintext = Vec::with_capacity(1 + payload.len());
        plaintext.push(DataType::Text as u8);
        plaintext.extend_from_slice(payload);

        let wire = DataFrame::seal(
            &self.config.gateway_eui,
            &plaintext,
            &session.app_s_key,
            &self.config.hmac_key,
            rng.next_u64(),
        );
        self.mediator.transmit(&wire)?;
        tracing::info!(dst = %dev_eui, bytes = payload.len(), "downlink routed");
        Ok(())
    }

    /// True if a session is cached for the device (memory tier only).
    #[must_use]
    pub fn has_session(&self, dev_eui: &DevEui) -> bool {
        self.sessions.exists(dev_eui)
    }

    /// Copy of a device's session, consulting both tiers.
    pub fn session(&mut self, dev_eui: &DevEui) -> Option<SessionInfo> {
        self.sessions.get(dev_eui)
    }

    /// Remove a device's session from both tiers.
    pub fn flush_session(&mut self, dev_eui: &DevEui) {
        self.sessions.flush(dev_eui);
    }

    /// Clear every session.
    pub fn flush_all_sessions(&mut self) {
        self.sessions.flush_all();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use loralite_crypto::{AppKey, HmacKey};
    use loralite_core::{MemoryKv, RadioError, RadioTiming};
    use loralite_proto::AppEui;
    use rand::rngs::mock::StepRng;

    use super::*;

    #[derive(Default)]
    struct SilentRadio {
        transmitted: Vec<Vec<u8>>,
    }

    impl PhysicalLayer for SilentRadio {
        fn standby(&mut self) -> Result<(), RadioError> {
            Ok(())
        }

        fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
            self.transmitted.push(frame.to_vec());
            Ok(())
        }

        fn start_receive(&mut self) -> Result<(), RadioError> {
            Ok(())
        }

        fn packet_length(&mut self) -> usize {
            0
        }

        fn read_data(&mut self, _buf: &mut [u8]) -> Result<usize, RadioError> {
            Ok(0)
        }

        fn receive(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, RadioError> {
            Ok(None)
        }
    }

    /// Sink that records published events.
    #[derive(Default)]
    struct RecordingNorthbound {
        events: Vec<GatewayEvent>,
    }

    impl Northbound for RecordingNorthbound {
        fn publish(&mut self, event: GatewayEvent) {
            self.events.push(event);
        }
    }

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::new(
            DevEui::new([9, 9, 9, 9, 9, 9, 9, 9]),
            AppKey::new([0u8; 16]),
            HmacKey::new([0u8; 16]),
            [0x01, 0x23, 0x45],
        );
        config.radio = RadioTiming {
            pre_transmit: Duration::from_millis(0),
            post_transmit: Duration::from_millis(0),
        };
        config
    }

    fn gateway() -> Gateway<SilentRadio, MemoryKv, RecordingNorthbound> {
        Gateway::new(config(), SilentRadio::default(), MemoryKv::new(), RecordingNorthbound::default())
    }

    fn join_wire(dev_nonce: u16) -> [u8; 22] {
        JoinRequest {
            dev_eui: DevEui::new([0, 0, 0, 0, 0, 0, 0, 1]),
            app_eui: AppEui::new([0, 0, 0, 0, 0, 0, 0, 2]),
            dev_nonce,
        }
        .encode(&HmacKey::new([0u8; 16]))
    }

    #[test]
    fn join_establishes_session_and_replies() {
        let mut gateway = gateway();
        let mut rng = StepRng::new(0x11CC_BBAA, 1);

        gateway.handle_frame(&join_wire(0x5678), &mut rng).unwrap();

        let dev_eui = DevEui::new([0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(gateway.has_session(&dev_eui));

        // One 16-byte accept went out.
        let radio = gateway.mediator.radio();
        assert_eq!(radio.transmitted.len(), 1);
        assert_eq!(radio.transmitted[0].len(), JoinAccept::LEN);

        assert!(matches!(
            gateway.northbound.events[0],
            GatewayEvent::Joined { dev_eui: d, .. } if d == dev_eui
        ));
    }

    #[test]
    fn join_with_bad_mic_dropped_silently() {
        let mut gateway = gateway();
        let mut wire = join_wire(1);
        wire[20] ^= 0xFF; // corrupt the MIC

        let err = gateway.handle_frame(&wire, &mut StepRng::new(0, 1)).unwrap_err();
        assert_eq!(err, GatewayError::AuthenticationFailed);

        assert!(!gateway.has_session(&DevEui::new([0, 0, 0, 0, 0, 0, 0, 1])));
        assert!(gateway.mediator.radio().transmitted.is_empty());
    }

    #[test]
    fn duplicate_join_leaves_session_untouched() {
        let mut gateway = gateway();
        let mut rng = StepRng::new(0xAAAA, 1);
        let dev_eui = DevEui::new([0, 0, 0, 0, 0, 0, 0, 1]);

        gateway.handle_frame(&join_wire(1), &mut rng).unwrap();
        let original = gateway.session(&dev_eui).unwrap();

        let err = gateway.handle_frame(&join_wire(2), &mut rng).unwrap_err();
        assert_eq!(err, GatewayError::AlreadyJoined { dev_eui: dev_eui.to_hex() });

        assert_eq!(gateway.session(&dev_eui), Some(original));
        // Only the first accept was transmitted.
        assert_eq!(gateway.mediator.radio().transmitted.len(), 1);
    }

    #[test]
    fn data_from_unknown_sender_rejected_before_decryption() {
        let mut gateway = gateway();
        let mut raw = vec![0xFF; 40];
        raw[..8].copy_from_slice(&[0xFF; 8]);

        let err = gateway.handle_frame(&raw, &mut StepRng::new(0, 1)).unwrap_err();
        assert_eq!(
            err,
            GatewayError::UnknownSession { dev_eui: "ffffffffffffffff".into() }
        );
    }

    #[test]
    fn unroutable_lengths_dropped() {
        let mut gateway = gateway();
        for len in [1usize, 16, 21, 23, 30, 32] {
            let err = gateway.handle_frame(&vec![0u8; len], &mut StepRng::new(0, 1)).unwrap_err();
            assert_eq!(err, GatewayError::UnroutableLength(len), "length {len}");
        }
    }

    #[test]
    fn uplink_decodes_and_acks() {
        let mut gateway = gateway();
        let mut rng = StepRng::new(0x11CC_BBAA, 1);
        let dev_eui = DevEui::new([0, 0, 0, 0, 0, 0, 0, 1]);

        gateway.handle_frame(&join_wire(0x5678), &mut rng).unwrap();
        let session = gateway.session(&dev_eui).unwrap();

        let wire = DataFrame::seal(
            &dev_eui,
            &[0x01, b'h', b'i'],
            &session.app_s_key,
            &HmacKey::new([0u8; 16]),
            99,
        );
        gateway.handle_frame(&wire, &mut rng).unwrap();

        let uplink = gateway
            .northbound
            .events
            .iter()
            .find_map(|e| match e {
                GatewayEvent::Uplink { regions, .. } => Some(regions.clone()),
                _ => None,
            })
            .expect("uplink event");
        assert_eq!(uplink, vec![Region::Text("hi".into())]);

        // Accept + ack on the air.
        assert_eq!(gateway.mediator.radio().transmitted.len(), 2);
        let ack = DataFrame::decode(&gateway.mediator.radio().transmitted[1]).unwrap();
        assert_eq!(ack.sender, DevEui::new([9, 9, 9, 9, 9, 9, 9, 9]));
        assert_eq!(ack.decrypt(&session.app_s_key), b"ACK:");
    }

    #[test]
    fn downlink_routed_by_hex_eui() {
        let mut gateway = gateway();
        let mut rng = StepRng::new(0xBBBB, 1);
        let dev_eui = DevEui::new([0, 0, 0, 0, 0, 0, 0, 1]);

        gateway.handle_frame(&join_wire(7), &mut rng).unwrap();
        let session = gateway.session(&dev_eui).unwrap();

        gateway.enqueue_downlink(&dev_eui.to_hex(), b"reboot", &mut rng).unwrap();

        let wire = gateway.mediator.radio().transmitted.last().unwrap().clone();
        let frame = DataFrame::decode(&wire).unwrap();
        assert_eq!(frame.decrypt(&session.app_s_key), b"\x01reboot");
    }

    #[test]
    fn downlink_to_unknown_destination_fails() {
        let mut gateway = gateway();
        let err = gateway
            .enqueue_downlink("0000000000000001", b"x", &mut StepRng::new(0, 1))
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownSession { .. }));

        let err = gateway.enqueue_downlink("not-hex", b"x", &mut StepRng::new(0, 1)).unwrap_err();
        assert!(matches!(err, GatewayError::UnknownSession { .. }));
    }
}

//! The end-device protocol engine.

use std::{thread, time::Duration};

use rand::RngCore;

use loralite_core::{
    DeviceConfig, KvStore, PhysicalLayer, RadioMediator, SessionInfo, SessionStore,
};
use loralite_proto::{decode_region, DataFrame, DataType, DevEui, JoinAccept, JoinRequest, Region};

use crate::{
    error::DeviceError,
    fs::FileStore,
    groups::GroupStore,
};

/// A decoded downlink.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReply {
    /// Frame sender (the gateway for downlinks).
    pub sender: DevEui,
    /// Decoded payload.
    pub payload: ReplyPayload,
}

/// Downlink payload, decoded by the leading type byte.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPayload {
    /// Single typed region.
    Typed(Region),
    /// Plaintext without a known type tag (the gateway's `"ACK:"` and
    /// routed command strings), decoded as printable text.
    Raw(String),
}

/// End-device role value.
///
/// Owns the mediator (and through it the radio), the session store, and
/// the group-file buffer. Driven from a single-threaded main loop.
pub struct EndDevice<R: PhysicalLayer, K: KvStore, F: FileStore> {
    config: DeviceConfig,
    sessions: SessionStore<K>,
    mediator: RadioMediator<R>,
    groups: GroupStore<F>,
    last_reply: Option<String>,
}

impl<R: PhysicalLayer, K: KvStore, F: FileStore> EndDevice<R, K, F> {
    /// Assemble the role from its collaborators.
    ///
    /// # Errors
    ///
    /// Rejects an invalid [`loralite_core::GroupConfig`].
    pub fn new(config: DeviceConfig, radio: R, kv: K, fs: F) -> Result<Self, DeviceError> {
        config.group.validate()?;

        let sessions = SessionStore::new(kv, config.app_key.clone());
        let mediator = RadioMediator::new(radio, config.radio);
        let groups = GroupStore::new(fs, config.group);

        Ok(Self { config, sessions, mediator, groups, last_reply: None })
    }

    /// This device's identifier.
    #[must_use]
    pub fn dev_eui(&self) -> DevEui {
        self.config.dev_eui
    }

    /// Handle to the mediator's received flag for the radio driver side.
    #[must_use]
    pub fn received_flag(&self) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
        self.mediator.received_flag()
    }

    /// True once a session is established (or recovered from
    /// persistence).
    pub fn is_joined(&mut self) -> bool {
        self.sessions.get(&self.config.dev_eui).is_some()
    }

    /// Copy of this device's session, if joined.
    pub fn session(&mut self) -> Option<SessionInfo> {
        let dev_eui = self.config.dev_eui;
        self.sessions.get(&dev_eui)
    }

    /// Arm the receiver; call once after boot.
    ///
    /// # Errors
    ///
    /// Propagates physical-layer failures.
    pub fn start(&mut self) -> Result<(), DeviceError> {
        self.mediator.start_receive()?;
        Ok(())
    }

    /// Run the join handshake.
    ///
    /// A no-op when a session already exists — including one recovered
    /// from the persistent tier after a reboot; nothing is transmitted in
    /// that case. Otherwise transmits up to `max_retries` join requests,
    /// each with a fresh device nonce, waiting `retry_delay` for the
    /// accept.
    ///
    /// # Errors
    ///
    /// [`DeviceError::JoinFailed`] when all attempts are exhausted;
    /// radio failures propagate.
    pub fn join(&mut self, rng: &mut impl RngCore) -> Result<(), DeviceError> {
        if self.sessions.get(&self.config.dev_eui).is_some() {
            tracing::info!(dev_eui = %self.config.dev_eui, "session exists, skipping join");
            return Ok(());
        }

        let attempts = self.config.join.max_retries;
        for attempt in 1..=attempts {
            tracing::info!(attempt, max = attempts, "sending join request");

            let dev_nonce = (rng.next_u32() & 0xFFFF) as u16;
            let request = JoinRequest {
                dev_eui: self.config.dev_eui,
                app_eui: self.config.app_eui,
                dev_nonce,
            };
            let wire = request.encode(&self.config.hmac_key);
            self.mediator.transmit(&wire)?;

            match self.mediator.receive(self.config.join.retry_delay) {
                Ok(Some(reply)) if reply.len() == JoinAccept::LEN => {
                    if self.complete_join(&reply, dev_nonce) {
                        return Ok(());
                    }
                }
                Ok(Some(reply)) => {
                    tracing::debug!(len = reply.len(), "ignoring non-accept reply during join");
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "radio error while waiting for join accept");
                }
            }

            tracing::info!(attempt, "no valid accept, retrying");
        }

        tracing::warn!(attempts, "join failed, giving up");
        Err(DeviceError::JoinFailed { attempts })
    }

    /// Open a join accept and establish the session.
    ///
    /// Returns false (and leaves no state behind) when the accept does
    /// not echo our outstanding nonce — either a stray frame or one
    /// sealed under a different root key.
    fn complete_join(&mut self, reply: &[u8], expected_nonce: u16) -> bool {
        let accept = match JoinAccept::open(reply, &self.config.app_key) {
            Ok(accept) => accept,
            Err(err) => {
                tracing::debug!(error = %err, "join accept failed to open");
                return false;
            }
        };

        if accept.dev_nonce != expected_nonce {
            tracing::debug!(
                got = accept.dev_nonce,
                expected = expected_nonce,
                "join accept nonce echo mismatch"
            );
            return false;
        }

        let session = SessionInfo::derive(
            &self.config.app_key,
            accept.dev_addr,
            accept.join_nonce,
            accept.net_id,
            accept.dev_nonce,
        );
        tracing::info!(dev_addr = %format_args!("{:#010x}", session.dev_addr), "joined");
        self.sessions.store(&self.config.dev_eui, session);
        true
    }

    /// Send one typed payload now.
    ///
    /// # Errors
    ///
    /// [`DeviceError::UnknownSession`] before a successful join; radio
    /// failures propagate. No retry beyond the single transmission.
    pub fn send(
        &mut self,
        payload: &[u8],
        data_type: DataType,
        rng: &mut impl RngCore,
    ) -> Result<(), DeviceError> {
        let session = self.require_session()?;

        let mut plaintext = Vec::with_capacity(1 + payload.len());
        plaintext.push(data_type as u8);
        plaintext.extend_from_slice(payload);

        let wire = DataFrame::seal(
            &self.config.dev_eui,
            &plaintext,
            &session.app_s_key,
            &self.config.hmac_key,
            rng.next_u64(),
        );
        self.mediator.transmit(&wire)?;
        tracing::debug!(bytes = wire.len(), "uplink sent");
        Ok(())
    }

    /// Send one typed payload after an optional settling delay.
    ///
    /// # Errors
    ///
    /// As [`Self::send`].
    pub fn send_delayed(
        &mut self,
        payload: &[u8],
        data_type: DataType,
        pre_delay: Duration,
        rng: &mut impl RngCore,
    ) -> Result<(), DeviceError> {
        if !pre_delay.is_zero() {
            tracing::debug!(?pre_delay, "waiting before send");
            thread::sleep(pre_delay);
        }
        self.send(payload, data_type, rng)
    }

    /// Stage a typed payload into the group-file buffer.
    ///
    /// # Errors
    ///
    /// See [`crate::BufferError`].
    pub fn store_packet(
        &mut self,
        data: &[u8],
        data_type: DataType,
        prefix: &str,
    ) -> Result<(), DeviceError> {
        self.groups.store_packet(data, data_type, prefix)?;
        Ok(())
    }

    /// Drain a group's buffered files over the air.
    ///
    /// Finds the lowest existing suffix; if the next suffix also exists,
    /// both files go out back to back with the receiver reopened only
    /// after the second, separated by the configured quiet period. Sent
    /// files are removed, and once the prefix is empty its suffix counter
    /// resets. Returns the number of files transmitted (0 when the buffer
    /// holds nothing).
    ///
    /// # Errors
    ///
    /// [`DeviceError::UnknownSession`] before a join; buffer and radio
    /// failures propagate.
    pub fn drain_group(
        &mut self,
        prefix: &str,
        rng: &mut impl RngCore,
    ) -> Result<usize, DeviceError> {
        let Some(first) = self.groups.lowest_suffix(prefix) else {
            tracing::debug!(prefix, "nothing buffered to drain");
            return Ok(0);
        };
        let session = self.require_session()?;

        let first_name = GroupStore::<F>::file_name(prefix, first);
        let second_name = GroupStore::<F>::file_name(prefix, first + 1);
        let has_second = self.groups.has_file(&second_name);

        self.transmit_file(&first_name, &session, !has_second, rng)?;
        self.groups.remove_file(&first_name)?;
        let mut sent = 1;

        if has_second {
            thread::sleep(self.config.quiet_period);
            self.transmit_file(&second_name, &session, true, rng)?;
            self.groups.remove_file(&second_name)?;
            sent = 2;
        }

        self.groups.reclaim(prefix)?;
        tracing::info!(prefix, files = sent, "group drained");
        Ok(sent)
    }

    fn transmit_file(
        &mut self,
        name: &str,
        session: &SessionInfo,
        reopen_receive: bool,
        rng: &mut impl RngCore,
    ) -> Result<(), DeviceError> {
        let plaintext = self.groups.load_plaintext(name)?;
        let wire = DataFrame::seal(
            &self.config.dev_eui,
            &plaintext,
            &session.app_s_key,
            &self.config.hmac_key,
            rng.next_u64(),
        );

        if reopen_receive {
            self.mediator.transmit(&wire)?;
        } else {
            self.mediator.transmit_no_reopen(&wire)?;
        }
        tracing::info!(file = %name, bytes = wire.len(), "group file sent");
        Ok(())
    }

    /// Poll for a received frame and process it.
    ///
    /// Frame-level errors are logged and the frame dropped; the receiver
    /// is re-armed either way.
    pub fn poll(&mut self) -> Option<DeviceReply> {
        let raw = self.mediator.on_received()?;

        let reply = match self.process_frame(&raw) {
            Ok(reply) => Some(reply),
            Err(err) => {
                tracing::warn!(error = %err, len = raw.len(), "dropping downlink");
                None
            }
        };

        if let Err(err) = self.mediator.start_receive() {
            tracing::warn!(error = %err, "failed to re-arm receiver");
        }
        reply
    }

    /// Verify, decrypt and decode one received frame.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::Frame`] on structural parse failure.
    /// - [`DeviceError::UnknownSession`] when the sender has no session.
    /// - [`DeviceError::AuthenticationFailed`] on a tag mismatch; the
    ///   ciphertext is never decrypted in that case.
    pub fn process_frame(&mut self, raw: &[u8]) -> Result<DeviceReply, DeviceError> {
        let frame = DataFrame::decode(raw)?;

        let session = self.sessions.get(&frame.sender).ok_or_else(|| {
            DeviceError::UnknownSession { dev_eui: frame.sender.to_hex() }
        })?;

        if !frame.verify_tag(&self.config.hmac_key) {
            tracing::warn!(sender = %frame.sender, "downlink tag mismatch");
            return Err(DeviceError::AuthenticationFailed);
        }

        let plaintext = frame.decrypt(&session.app_s_key);
        debug_assert!(!plaintext.is_empty());

        let payload = match DataType::try_from(plaintext[0]) {
            Ok(data_type) => ReplyPayload::Typed(decode_region(data_type, &plaintext[1..])),
            Err(_) => ReplyPayload::Raw(decode_raw_text(&plaintext)),
        };

        match &payload {
            ReplyPayload::Raw(text) => {
                tracing::info!(sender = %frame.sender, %text, "downlink message");
                self.last_reply = Some(text.clone());
            }
            ReplyPayload::Typed(Region::Text(text)) => {
                tracing::info!(sender = %frame.sender, %text, "downlink text");
                self.last_reply = Some(text.clone());
            }
            ReplyPayload::Typed(region) => {
                tracing::info!(sender = %frame.sender, ?region, "downlink payload");
            }
        }

        Ok(DeviceReply { sender: frame.sender, payload })
    }

    /// Most recent textual downlink (ACKs and routed commands).
    #[must_use]
    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    /// Drop this device's session from both tiers, returning to the
    /// unjoined state.
    pub fn flush_session(&mut self) {
        let dev_eui = self.config.dev_eui;
        self.sessions.flush(&dev_eui);
    }

    fn require_session(&mut self) -> Result<SessionInfo, DeviceError> {
        self.sessions.get(&self.config.dev_eui).ok_or_else(|| DeviceError::UnknownSession {
            dev_eui: self.config.dev_eui.to_hex(),
        })
    }
}

/// Decode an untyped plaintext as printable text, stopping at the first
/// NUL.
fn decode_raw_text(plaintext: &[u8]) -> String {
    plaintext
        .iter()
        .take_while(|&&b| b != 0x00)
        .filter(|&&b| (0x20..=0x7E).contains(&b))
        .map(|&b| b as char)
        .collect()
}

//! Post-join session state and the two-tier session store.
//!
//! A session is everything a role needs to exchange data frames with a
//! peer after the join handshake: the assigned address, both derived
//! session keys, and the nonces they were derived from.
//!
//! The store keeps sessions in two tiers. The volatile tier is a plain
//! map consulted on every frame; the persistent tier survives reboots and
//! holds each session AES-ECB-encrypted under the `AppKey` as a fixed
//! 32-byte blob. Writes go through to both tiers; reads promote from the
//! persistent tier into memory.

use std::collections::HashMap;

use loralite_crypto::{
    derive_session_key, ecb_decrypt_in_place, ecb_encrypt_in_place, AppKey, SessionKeyKind,
};
use loralite_proto::DevEui;

use crate::storage::KvStore;

/// Post-join session state for one device.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Address assigned by the gateway at join time.
    pub dev_addr: u32,
    /// Application session key (AES-CTR over payloads).
    pub app_s_key: [u8; 16],
    /// Network session key (reserved for MAC-layer use).
    pub nwk_s_key: [u8; 16],
    /// Gateway-supplied nonce from the join accept.
    pub join_nonce: [u8; 3],
    /// Network identifier.
    pub net_id: [u8; 3],
    /// Device-supplied nonce echoed in the join accept.
    pub dev_nonce: u16,
}

impl SessionInfo {
    /// Size of the serialised form at rest.
    pub const PERSIST_LEN: usize = 32;

    /// Derive a complete session from the values exchanged in the join.
    ///
    /// Both roles call this with the same inputs and arrive at the same
    /// keys; nothing key-shaped crosses the air.
    #[must_use]
    pub fn derive(
        app_key: &AppKey,
        dev_addr: u32,
        join_nonce: [u8; 3],
        net_id: [u8; 3],
        dev_nonce: u16,
    ) -> Self {
        let app_s_key = derive_session_key(
            SessionKeyKind::Application,
            app_key,
            &join_nonce,
            &net_id,
            dev_nonce,
        );
        let nwk_s_key = derive_session_key(
            SessionKeyKind::Network,
            app_key,
            &join_nonce,
            &net_id,
            dev_nonce,
        );

        Self { dev_addr, app_s_key, nwk_s_key, join_nonce, net_id, dev_nonce }
    }

    /// Serialise to the fixed 32-byte persistence layout.
    ///
    /// ```text
    /// [0..4)   dev_addr (LE)
    /// [4..20)  app_s_key
    /// [20..23) join_nonce
    /// [23..26) net_id
    /// [26..28) dev_nonce (LE)
    /// [28..32) zero
    /// ```
    ///
    /// `nwk_s_key` is not stored — it is a pure function of the `AppKey`
    /// and the persisted nonces, and is re-derived on load.
    #[must_use]
    pub fn to_persist_bytes(&self) -> [u8; Self::PERSIST_LEN] {
        let mut blob = [0u8; Self::PERSIST_LEN];
        blob[..4].copy_from_slice(&self.dev_addr.to_le_bytes());
        blob[4..20].copy_from_slice(&self.app_s_key);
        blob[20..23].copy_from_slice(&self.join_nonce);
        blob[23..26].copy_from_slice(&self.net_id);
        blob[26..28].copy_from_slice(&self.dev_nonce.to_le_bytes());
        blob
    }

    /// Rebuild a session from its persisted form, re-deriving the network
    /// session key.
    #[must_use]
    pub fn from_persist_bytes(blob: &[u8; Self::PERSIST_LEN], app_key: &AppKey) -> Self {
        let dev_addr = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]);

        let mut app_s_key = [0u8; 16];
        app_s_key.copy_from_slice(&blob[4..20]);

        let join_nonce = [blob[20], blob[21], blob[22]];
        let net_id = [blob[23], blob[24], blob[25]];
        let dev_nonce = u16::from_le_bytes([blob[26], blob[27]]);

        let nwk_s_key = derive_session_key(
            SessionKeyKind::Network,
            app_key,
            &join_nonce,
            &net_id,
            dev_nonce,
        );

        Self { dev_addr, app_s_key, nwk_s_key, join_nonce, net_id, dev_nonce }
    }
}

impl std::fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInfo")
            .field("dev_addr", &format_args!("{:#010x}", self.dev_addr))
            .field("app_s_key", &"..")
            .field("nwk_s_key", &"..")
            .field("join_nonce", &self.join_nonce)
            .field("net_id", &self.net_id)
            .field("dev_nonce", &self.dev_nonce)
            .finish()
    }
}

/// Two-tier session store: volatile cache over encrypted persistence.
///
/// Keys are the full 16-character DevEUI hex string. The store owns the
/// `SessionInfo` values; callers receive copies.
///
/// # Invariants
///
/// - A cached entry equals the most recently stored value.
/// - The at-rest form is exactly 32 bytes, AES-ECB(AppKey) block-wise over
///   the serialised session. A persisted record of any other size is
///   treated as absent.
pub struct SessionStore<K: KvStore> {
    cache: HashMap<String, SessionInfo>,
    kv: K,
    app_key: AppKey,
}

impl<K: KvStore> SessionStore<K> {
    /// Create a store over the given persistence backend.
    pub fn new(kv: K, app_key: AppKey) -> Self {
        Self { cache: HashMap::new(), kv, app_key }
    }

    /// Store a session in both tiers.
    ///
    /// Memory is updated first and unconditionally. A persistence failure
    /// is logged and swallowed: the session keeps working until the next
    /// reboot, which will lose it.
    pub fn store(&mut self, dev_eui: &DevEui, session: SessionInfo) {
        let key = dev_eui.to_hex();

        let mut blob = session.to_persist_bytes();
        ecb_encrypt_in_place(self.app_key.as_bytes(), &mut blob);

        self.cache.insert(key.clone(), session);
        tracing::debug!(dev_eui = %key, "session cached in memory");

        if let Err(err) = self.kv.put(&key, &blob) {
            tracing::warn!(dev_eui = %key, error = %err, "session not persisted; will not survive reboot");
        }
    }

    /// Fetch a session: memory first, then the persistent tier.
    ///
    /// A successful load from persistence is promoted into memory.
    pub fn get(&mut self, dev_eui: &DevEui) -> Option<SessionInfo> {
        let key = dev_eui.to_hex();

        if let Some(session) = self.cache.get(&key) {
            return Some(session.clone());
        }

        let blob = match self.kv.get(&key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(dev_eui = %key, error = %err, "persistent tier unavailable");
                return None;
            }
        };

        // Anything but the fixed blob size is treated as "not present".
        let blob: [u8; SessionInfo::PERSIST_LEN] = match blob.try_into() {
            Ok(blob) => blob,
            Err(bad) => {
                tracing::warn!(
                    dev_eui = %key,
                    len = bad.len(),
                    "ignoring persisted session of unexpected size"
                );
                return None;
            }
        };

        let mut plain = blob;
        ecb_decrypt_in_place(self.app_key.as_bytes(), &mut plain);
        let session = SessionInfo::from_persist_bytes(&plain, &self.app_key);

        tracing::debug!(dev_eui = %key, "session loaded from persistence");
        self.cache.insert(key, session.clone());
        Some(session)
    }

    /// True if a session is present in the volatile tier.
    ///
    /// Used to short-circuit duplicate joins; deliberately does not touch
    /// persistence.
    #[must_use]
    pub fn exists(&self, dev_eui: &DevEui) -> bool {
        self.cache.contains_key(&dev_eui.to_hex())
    }

    /// Remove a session from both tiers.
    pub fn flush(&mut self, dev_eui: &DevEui) {
        let key = dev_eui.to_hex();
        self.cache.remove(&key);
        if let Err(err) = self.kv.remove(&key) {
            tracing::warn!(dev_eui = %key, error = %err, "failed to remove persisted session");
        }
        tracing::info!(dev_eui = %key, "session flushed");
    }

    /// Clear both tiers.
    pub fn flush_all(&mut self) {
        self.cache.clear();
        if let Err(err) = self.kv.clear() {
            tracing::warn!(error = %err, "failed to clear persisted sessions");
        }
        tracing::info!("all sessions flushed");
    }

    /// Drop the volatile tier only, keeping persistence intact.
    ///
    /// This is what a reboot does to the store; tests use it to verify
    /// that sessions survive through the persistent tier.
    pub fn drop_cache(&mut self) {
        self.cache.clear();
    }
}

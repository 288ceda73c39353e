//! Root key material and session-key derivation.
//!
//! Two root keys are provisioned out of band: the per-device `AppKey`
//! (session-key derivation and join-accept sealing only) and the
//! network-wide `HmacKey` (frame authentication). Neither is ever
//! transmitted. Both zeroize on drop and redact their `Debug` output.

use core::fmt;

use zeroize::Zeroize;

use crate::block::encrypt_block;

/// Device root key (AES-128).
#[derive(Clone, PartialEq, Eq)]
pub struct AppKey([u8; 16]);

impl Drop for AppKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl AppKey {
    /// Wrap a provisioned 16-byte key.
    #[must_use]
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppKey(..)")
    }
}

/// Network-wide frame authentication key (HMAC-SHA-256).
#[derive(Clone, PartialEq, Eq)]
pub struct HmacKey([u8; 16]);

impl Drop for HmacKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl HmacKey {
    /// Wrap a provisioned 16-byte key.
    #[must_use]
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacKey(..)")
    }
}

/// Which session key to derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionKeyKind {
    /// Network session key (reserved for MAC-layer use).
    Network = 0x01,
    /// Application session key (payload encryption).
    Application = 0x02,
}

/// Derive a session key per the LoRaWAN 1.0 construction.
///
/// The derivation input is a single AES block:
///
/// ```text
/// [ kind, joinNonce(3), netID(3), devNonce LE(2), 0x00 x 7 ]
/// ```
///
/// encrypted under the `AppKey`. Both sides of the join compute this
/// independently from the values exchanged in the handshake; the result
/// never appears on the air.
#[must_use]
pub fn derive_session_key(
    kind: SessionKeyKind,
    app_key: &AppKey,
    join_nonce: &[u8; 3],
    net_id: &[u8; 3],
    dev_nonce: u16,
) -> [u8; 16] {
    let mut input = [0u8; 16];
    input[0] = kind as u8;
    input[1..4].copy_from_slice(join_nonce);
    input[4..7].copy_from_slice(net_id);
    input[7..9].copy_from_slice(&dev_nonce.to_le_bytes());

    encrypt_block(app_key.as_bytes(), &input)
}

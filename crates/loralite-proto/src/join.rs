//! Join handshake frames.
//!
//! The handshake is two fixed-size frames. The request travels in clear
//! with a 4-byte MIC; the accept is a single AES block sealed under the
//! `AppKey`.
//!
//! Per LoRaWAN convention the gateway seals the accept with the AES
//! *decrypt* primitive and the device opens it with *encrypt*. That
//! inversion lets constrained devices ship only the encrypt half of AES.
//! It is preserved here exactly; no other operation swaps the directions.

use loralite_crypto::{decrypt_block, encrypt_block, hmac_sha256, tag_eq, AppKey, HmacKey};

use crate::{AppEui, DevEui, ProtocolError, Result};

/// Device → gateway handshake opener.
///
/// ```text
/// [0..8)   DevEUI
/// [8..16)  AppEUI
/// [16..18) DevNonce (LE u16)
/// [18..22) MIC: HMAC-SHA-256(HmacKey, bytes[0..18))[0..4]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Joining device.
    pub dev_eui: DevEui,
    /// Application the device belongs to.
    pub app_eui: AppEui,
    /// Fresh device nonce, echoed back in the accept.
    pub dev_nonce: u16,
}

impl JoinRequest {
    /// Exact wire size.
    pub const LEN: usize = 22;

    /// MIC length (truncated HMAC).
    pub const MIC_LEN: usize = 4;

    /// Serialise with MIC.
    #[must_use]
    pub fn encode(&self, hmac_key: &HmacKey) -> [u8; Self::LEN] {
        let mut wire = [0u8; Self::LEN];
        wire[..8].copy_from_slice(self.dev_eui.as_bytes());
        wire[8..16].copy_from_slice(self.app_eui.as_bytes());
        wire[16..18].copy_from_slice(&self.dev_nonce.to_le_bytes());

        let mic = hmac_sha256(hmac_key.as_bytes(), &wire[..18]);
        wire[18..].copy_from_slice(&mic[..Self::MIC_LEN]);
        wire
    }

    /// Parse the fixed layout. Does not check the MIC.
    ///
    /// # Errors
    ///
    /// `ProtocolError::InvalidLength` unless exactly 22 bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(ProtocolError::InvalidLength {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }

        let mut app_eui = [0u8; 8];
        app_eui.copy_from_slice(&bytes[8..16]);

        Ok(Self {
            dev_eui: DevEui::from_slice(bytes),
            app_eui: AppEui::new(app_eui),
            dev_nonce: u16::from_le_bytes([bytes[16], bytes[17]]),
        })
    }

    /// Verify the MIC on a raw 22-byte request, in constant time.
    ///
    /// Takes the raw buffer rather than a parsed frame so verification can
    /// happen before any field is interpreted.
    #[must_use]
    pub fn verify_mic(bytes: &[u8], hmac_key: &HmacKey) -> bool {
        if bytes.len() != Self::LEN {
            return false;
        }
        let digest = hmac_sha256(hmac_key.as_bytes(), &bytes[..18]);
        tag_eq(&digest[..Self::MIC_LEN], &bytes[18..])
    }
}

/// Gateway → device handshake reply, sealed under the `AppKey`.
///
/// Plaintext layout (one AES block):
///
/// ```text
/// [0..4)   DevAddr (LE u32)
/// [4..7)   JoinNonce
/// [7..10)  NetID
/// [10..12) DevNonce echo (LE u16)
/// [12..16) reserved, zero
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAccept {
    /// Address assigned to the device.
    pub dev_addr: u32,
    /// Gateway-chosen nonce for key derivation.
    pub join_nonce: [u8; 3],
    /// Network identifier.
    pub net_id: [u8; 3],
    /// Echo of the request's device nonce; the device rejects an accept
    /// whose echo does not match its outstanding value.
    pub dev_nonce: u16,
}

impl JoinAccept {
    /// Exact wire size (one AES block).
    pub const LEN: usize = 16;

    /// Seal for transmission: encode the plaintext block, then run AES-ECB
    /// **decrypt** under the `AppKey` (the LoRaWAN inversion).
    #[must_use]
    pub fn seal(&self, app_key: &AppKey) -> [u8; Self::LEN] {
        let mut block = [0u8; Self::LEN];
        block[..4].copy_from_slice(&self.dev_addr.to_le_bytes());
        block[4..7].copy_from_slice(&self.join_nonce);
        block[7..10].copy_from_slice(&self.net_id);
        block[10..12].copy_from_slice(&self.dev_nonce.to_le_bytes());

        decrypt_block(app_key.as_bytes(), &block)
    }

    /// Open a received accept: run AES-ECB **encrypt** under the `AppKey`
    /// and parse the plaintext block.
    ///
    /// # Errors
    ///
    /// `ProtocolError::InvalidLength` unless exactly 16 bytes.
    pub fn open(bytes: &[u8], app_key: &AppKey) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(ProtocolError::InvalidLength {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }

        let mut sealed = [0u8; Self::LEN];
        sealed.copy_from_slice(bytes);
        let block = encrypt_block(app_key.as_bytes(), &sealed);

        Ok(Self {
            dev_addr: u32::from_le_bytes([block[0], block[1], block[2], block[3]]),
            join_nonce: [block[4], block[5], block[6]],
            net_id: [block[7], block[8], block[9]],
            dev_nonce: u16::from_le_bytes([block[10], block[11]]),
        })
    }
}

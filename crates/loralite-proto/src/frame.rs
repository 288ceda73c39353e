//! Authenticated-encrypted data frame.
//!
//! Layout on the air:
//!
//! ```text
//! [0..8)       sender DevEUI
//! [8..24)      nonce: sender DevEUI (8) || counter (8, LE)
//! [24..24+N)   ciphertext (AES-128-CTR, no padding)
//! [24+N..32+N) tag: HMAC-SHA-256(HmacKey, bytes[0..24+N))[0..8]
//! ```
//!
//! The codec owns nonce construction and tag placement; the counter half of
//! the nonce is supplied by the caller (drawn from the RNG per packet).
//! `decode` validates structure only — the tag must be verified and the
//! ciphertext decrypted as separate, explicit steps, so a receive pipeline
//! can refuse to touch the plaintext of an unauthenticated frame.

use bytes::BufMut;

use loralite_crypto::{apply_ctr, hmac_sha256_parts, tag_eq, HmacKey};

use crate::{DevEui, ProtocolError, Result};

/// Parsed data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    /// Sender identifier, used for session lookup.
    pub sender: DevEui,
    /// Full 16-byte initial counter block.
    pub nonce: [u8; 16],
    /// Encrypted payload, at least one byte.
    pub ciphertext: Vec<u8>,
    /// Truncated HMAC over everything before it.
    pub tag: [u8; 8],
}

impl DataFrame {
    /// Bytes before the ciphertext: sender plus nonce.
    pub const HEADER_LEN: usize = 24;

    /// Truncated tag length.
    pub const TAG_LEN: usize = 8;

    /// Smallest valid frame: header, one ciphertext byte, tag.
    ///
    /// Also the routing boundary — the receive loop sends anything longer
    /// than 32 bytes here, so an empty payload cannot be represented.
    pub const MIN_LEN: usize = Self::HEADER_LEN + 1 + Self::TAG_LEN;

    /// Build a sealed frame from plaintext.
    ///
    /// Encrypts under `app_s_key` with the nonce `sender || counter`, then
    /// appends the truncated HMAC under the network key. `counter` must be
    /// fresh per packet; the caller draws it from its RNG.
    #[must_use]
    pub fn seal(
        sender: &DevEui,
        plaintext: &[u8],
        app_s_key: &[u8; 16],
        hmac_key: &HmacKey,
        counter: u64,
    ) -> Vec<u8> {
        debug_assert!(!plaintext.is_empty(), "data frames carry at least the type byte");

        let mut nonce = [0u8; 16];
        nonce[..8].copy_from_slice(sender.as_bytes());
        nonce[8..].copy_from_slice(&counter.to_le_bytes());

        let mut ciphertext = plaintext.to_vec();
        apply_ctr(app_s_key, &nonce, &mut ciphertext);

        let mut wire = Vec::with_capacity(Self::HEADER_LEN + ciphertext.len() + Self::TAG_LEN);
        wire.put_slice(sender.as_bytes());
        wire.put_slice(&nonce);
        wire.put_slice(&ciphertext);

        let tag = hmac_sha256_parts(hmac_key.as_bytes(), &[wire.as_slice()]);
        wire.put_slice(&tag[..Self::TAG_LEN]);
        wire
    }

    /// Parse a frame from the wire.
    ///
    /// Structural validation only: length and field boundaries. The tag is
    /// carried over verbatim, unverified.
    ///
    /// # Errors
    ///
    /// `ProtocolError::FrameTooShort` if fewer than [`Self::MIN_LEN`] bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::MIN_LEN {
            return Err(ProtocolError::FrameTooShort {
                expected: Self::MIN_LEN,
                actual: bytes.len(),
            });
        }

        let sender = DevEui::from_slice(bytes);

        let mut nonce = [0u8; 16];
        nonce.copy_from_slice(&bytes[8..24]);

        let tag_start = bytes.len() - Self::TAG_LEN;
        let ciphertext = bytes[Self::HEADER_LEN..tag_start].to_vec();

        let mut tag = [0u8; 8];
        tag.copy_from_slice(&bytes[tag_start..]);

        Ok(Self { sender, nonce, ciphertext, tag })
    }

    /// Verify the truncated tag in constant time.
    ///
    /// Recomputes HMAC-SHA-256 over `sender || nonce || ciphertext` — the
    /// exact bytes that preceded the tag on the wire.
    #[must_use]
    pub fn verify_tag(&self, hmac_key: &HmacKey) -> bool {
        let digest = hmac_sha256_parts(
            hmac_key.as_bytes(),
            &[
                self.sender.as_bytes().as_slice(),
                self.nonce.as_slice(),
                self.ciphertext.as_slice(),
            ],
        );
        tag_eq(&digest[..Self::TAG_LEN], &self.tag)
    }

    /// Decrypt the payload under the session key.
    ///
    /// Call only after [`Self::verify_tag`] has accepted the frame.
    #[must_use]
    pub fn decrypt(&self, app_s_key: &[u8; 16]) -> Vec<u8> {
        let mut plaintext = self.ciphertext.clone();
        apply_ctr(app_s_key, &self.nonce, &mut plaintext);
        plaintext
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn keys() -> ([u8; 16], HmacKey) {
        ([0x11; 16], HmacKey::new([0x22; 16]))
    }

    fn sender() -> DevEui {
        DevEui::new([0, 0, 0, 0, 0, 0, 0, 1])
    }

    #[test]
    fn seal_layout() {
        let (app_s_key, hmac_key) = keys();
        let wire = DataFrame::seal(&sender(), &[0x01, b'h', b'i'], &app_s_key, &hmac_key, 0x0102030405060708);

        assert_eq!(wire.len(), 24 + 3 + 8);
        assert_eq!(&wire[..8], sender().as_bytes());
        // Nonce embeds the sender and the LE counter.
        assert_eq!(&wire[8..16], sender().as_bytes());
        assert_eq!(&wire[16..24], &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn round_trip() {
        let (app_s_key, hmac_key) = keys();
        let plaintext = [0x02, 0xDE, 0xAD, 0xBE, 0xEF];

        let wire = DataFrame::seal(&sender(), &plaintext, &app_s_key, &hmac_key, 42);
        let frame = DataFrame::decode(&wire).expect("should decode");

        assert_eq!(frame.sender, sender());
        assert!(frame.verify_tag(&hmac_key));
        assert_eq!(frame.decrypt(&app_s_key), plaintext);
    }

    #[test]
    fn reject_short_frame() {
        let result = DataFrame::decode(&[0u8; 32]);
        assert_eq!(
            result,
            Err(ProtocolError::FrameTooShort { expected: 33, actual: 32 })
        );
    }

    #[test]
    fn every_single_bit_flip_invalidates_tag() {
        let (app_s_key, hmac_key) = keys();
        // 32 bytes of payload = 256 tamper positions before the tag field.
        let plaintext: Vec<u8> = (0..32).collect();
        let wire = DataFrame::seal(&sender(), &plaintext, &app_s_key, &hmac_key, 7);

        let tag_start = wire.len() - DataFrame::TAG_LEN;
        for byte in 0..tag_start {
            for bit in 0..8 {
                let mut tampered = wire.clone();
                tampered[byte] ^= 1 << bit;
                let frame = DataFrame::decode(&tampered).expect("still structurally valid");
                assert!(
                    !frame.verify_tag(&hmac_key),
                    "flip of bit {bit} in byte {byte} must be rejected"
                );
            }
        }
    }

    #[test]
    fn wrong_network_key_rejected() {
        let (app_s_key, hmac_key) = keys();
        let wire = DataFrame::seal(&sender(), &[0x01, 0x02], &app_s_key, &hmac_key, 1);
        let frame = DataFrame::decode(&wire).unwrap();
        assert!(!frame.verify_tag(&HmacKey::new([0x23; 16])));
    }

    proptest! {
        #[test]
        fn seal_decode_round_trip(
            sender_bytes in any::<[u8; 8]>(),
            plaintext in prop::collection::vec(any::<u8>(), 1..200),
            counter in any::<u64>(),
            app_s_key in any::<[u8; 16]>(),
            hmac_bytes in any::<[u8; 16]>(),
        ) {
            let sender = DevEui::new(sender_bytes);
            let hmac_key = HmacKey::new(hmac_bytes);

            let wire = DataFrame::seal(&sender, &plaintext, &app_s_key, &hmac_key, counter);
            let frame = DataFrame::decode(&wire).expect("should decode");

            prop_assert_eq!(frame.sender, sender);
            prop_assert!(frame.verify_tag(&hmac_key));
            prop_assert_eq!(frame.decrypt(&app_s_key), plaintext);
        }
    }
}

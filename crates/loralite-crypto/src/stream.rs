//! AES-128-CTR payload encryption.
//!
//! The nonce argument is the full 16-byte initial counter block, not a
//! shorter IV: the data-frame codec builds it as
//! `sender EUI (8) || random counter (8)`. The counter increments big-endian
//! over the whole block, which is what the peer's mbedtls-style CTR expects.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;

type Aes128Ctr = Ctr128BE<Aes128>;

/// Apply the AES-128-CTR keystream to `buf` in place.
///
/// CTR is its own inverse: the same call encrypts and decrypts. No padding
/// is involved; `buf` may have any length.
pub fn apply_ctr(key: &[u8; 16], nonce: &[u8; 16], buf: &mut [u8]) {
    let mut cipher = Aes128Ctr::new(key.into(), nonce.into());
    cipher.apply_keystream(buf);
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn matches_sp800_38a_vector() {
        // NIST SP 800-38A F.5.1, first block
        let key: [u8; 16] = [
            0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09,
            0xcf, 0x4f, 0x3c,
        ];
        let nonce: [u8; 16] = [
            0xf0, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa, 0xfb, 0xfc,
            0xfd, 0xfe, 0xff,
        ];
        let mut buf: [u8; 16] = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73,
            0x93, 0x17, 0x2a,
        ];
        let expected: [u8; 16] = [
            0x87, 0x4d, 0x61, 0x91, 0xb6, 0x20, 0xe3, 0x26, 0x1b, 0xef, 0x68, 0x64, 0x99,
            0x0d, 0xb6, 0xce,
        ];

        apply_ctr(&key, &nonce, &mut buf);
        assert_eq!(buf, expected);
    }

    #[test]
    fn odd_lengths_need_no_padding() {
        let key = [7u8; 16];
        let nonce = [9u8; 16];
        let mut buf = vec![0xABu8; 5];

        apply_ctr(&key, &nonce, &mut buf);
        assert_eq!(buf.len(), 5);

        apply_ctr(&key, &nonce, &mut buf);
        assert_eq!(buf, vec![0xABu8; 5]);
    }

    proptest! {
        #[test]
        fn round_trip(
            key in any::<[u8; 16]>(),
            nonce in any::<[u8; 16]>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let mut buf = plaintext.clone();
            apply_ctr(&key, &nonce, &mut buf);
            apply_ctr(&key, &nonce, &mut buf);
            prop_assert_eq!(buf, plaintext);
        }

        #[test]
        fn different_nonces_differ(
            key in any::<[u8; 16]>(),
            plaintext in prop::collection::vec(any::<u8>(), 1..128),
        ) {
            let mut a = plaintext.clone();
            let mut b = plaintext;
            apply_ctr(&key, &[0u8; 16], &mut a);
            apply_ctr(&key, &[1u8; 16], &mut b);
            prop_assert_ne!(a, b);
        }
    }
}

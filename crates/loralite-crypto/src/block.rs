//! Single-block AES-128-ECB operations.
//!
//! The protocol uses raw block operations in three places: join-accept
//! sealing (where the gateway runs the *decrypt* direction to encrypt, per
//! LoRaWAN convention), session-key derivation, and the encryption of
//! serialised sessions at rest. ECB is never applied to attacker-controlled
//! plaintext longer than two blocks.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Block};

/// Encrypt a single 16-byte block with AES-128.
#[must_use]
pub fn encrypt_block(key: &[u8; 16], input: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(key.into());
    let mut block = Block::clone_from_slice(input);
    cipher.encrypt_block(&mut block);
    block.into()
}

/// Decrypt a single 16-byte block with AES-128.
#[must_use]
pub fn decrypt_block(key: &[u8; 16], input: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(key.into());
    let mut block = Block::clone_from_slice(input);
    cipher.decrypt_block(&mut block);
    block.into()
}

/// Encrypt a buffer block-wise in place.
///
/// `data.len()` must be a multiple of 16; the session store uses this for
/// its fixed 32-byte blobs.
pub fn ecb_encrypt_in_place(key: &[u8; 16], data: &mut [u8]) {
    debug_assert_eq!(data.len() % 16, 0, "ECB input must be block-aligned");
    let cipher = Aes128::new(key.into());
    for chunk in data.chunks_exact_mut(16) {
        cipher.encrypt_block(Block::from_mut_slice(chunk));
    }
}

/// Decrypt a buffer block-wise in place. Counterpart of
/// [`ecb_encrypt_in_place`].
pub fn ecb_decrypt_in_place(key: &[u8; 16], data: &mut [u8]) {
    debug_assert_eq!(data.len() % 16, 0, "ECB input must be block-aligned");
    let cipher = Aes128::new(key.into());
    for chunk in data.chunks_exact_mut(16) {
        cipher.decrypt_block(Block::from_mut_slice(chunk));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS-197 Appendix C.1
    const KEY: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
        0x0e, 0x0f,
    ];
    const PLAIN: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
        0xee, 0xff,
    ];
    const CIPHER: [u8; 16] = [
        0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
        0xc5, 0x5a,
    ];

    #[test]
    fn encrypt_matches_fips_vector() {
        assert_eq!(encrypt_block(&KEY, &PLAIN), CIPHER);
    }

    #[test]
    fn decrypt_inverts_encrypt() {
        assert_eq!(decrypt_block(&KEY, &CIPHER), PLAIN);
    }

    #[test]
    fn two_block_round_trip() {
        let mut blob = [0u8; 32];
        for (i, byte) in blob.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let original = blob;

        ecb_encrypt_in_place(&KEY, &mut blob);
        assert_ne!(blob, original);

        ecb_decrypt_in_place(&KEY, &mut blob);
        assert_eq!(blob, original);
    }

    #[test]
    fn blocks_are_encrypted_independently() {
        let mut blob = [0x42u8; 32];
        ecb_encrypt_in_place(&KEY, &mut blob);

        // Identical plaintext blocks produce identical ciphertext blocks.
        let (first, second) = blob.split_at(16);
        assert_eq!(first, second);
        assert_eq!(first, encrypt_block(&KEY, &[0x42u8; 16]));
    }
}

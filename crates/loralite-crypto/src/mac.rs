//! HMAC-SHA-256 and constant-time tag comparison.
//!
//! Every frame on the air carries a truncated HMAC (8 bytes on data frames,
//! 4 on join requests), keyed with the network-wide `HmacKey`. Truncated
//! tags are compared in constant time; an early-exit byte loop would leak
//! the match prefix length through timing.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA-256 over a single message.
#[must_use]
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    hmac_sha256_parts(key, &[msg])
}

/// Compute HMAC-SHA-256 over the concatenation of `parts`.
///
/// Equivalent to hashing the parts joined into one buffer, without the
/// intermediate allocation. The frame codec authenticates
/// `sender || nonce || ciphertext` this way.
#[must_use]
pub fn hmac_sha256_parts(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    for part in parts {
        mac.update(part);
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Constant-time equality of two tags.
///
/// Returns `false` on length mismatch. The length comparison itself is not
/// constant time; tag lengths are public protocol constants.
#[must_use]
pub fn tag_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

//! Cryptographic primitives for the loralite stack.
//!
//! Everything the protocol needs is built from two algorithms: AES-128 and
//! HMAC-SHA-256. This crate wraps the RustCrypto implementations behind the
//! exact operations the codec and session layer consume:
//!
//! - single-block AES-128-ECB (join-accept sealing, session-key derivation,
//!   session blob encryption)
//! - AES-128-CTR with a full 16-byte initial counter block (data payloads)
//! - HMAC-SHA-256 with truncated-tag verification (frame MICs)
//!
//! All functions are pure: random material (nonces, counters) must be
//! provided by the caller. This keeps the protocol engines deterministic
//! under test.

mod block;
mod keys;
mod mac;
mod stream;

pub use block::{decrypt_block, ecb_decrypt_in_place, ecb_encrypt_in_place, encrypt_block};
pub use keys::{derive_session_key, AppKey, HmacKey, SessionKeyKind};
pub use mac::{hmac_sha256, hmac_sha256_parts, tag_eq};
pub use stream::apply_ctr;

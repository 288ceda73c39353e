//! Persistence abstraction for session state.
//!
//! The non-volatile store collaborator is a byte-blob key/value namespace:
//! short string keys, opaque values. The trait mirrors exactly the
//! operations the session layer consumes — put, get, remove, clear — and
//! nothing else.
//!
//! Two backends ship: [`MemoryKv`] for tests and simulation, and
//! [`RedbKv`] for durable storage. Backends store ciphertext; encryption
//! and the fixed 32-byte blob size are enforced a layer up, in
//! [`crate::SessionStore`].

mod memory;
mod redb;

use thiserror::Error;

pub use self::memory::MemoryKv;
pub use self::redb::RedbKv;

/// Persistence failure.
///
/// Maps to the "persistence unavailable" policy: the session layer logs a
/// warning and keeps serving from memory; the session is simply lost on the
/// next reboot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing store could not be opened, read, or written.
    #[error("persistent store unavailable: {0}")]
    Unavailable(String),
}

/// Byte-blob key/value store.
///
/// Keys are short strings (DevEUI hex); values are opaque byte blobs.
/// Implementations open and close the underlying store within each call —
/// no long-lived handle is retained between operations.
pub trait KvStore {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove the value stored under `key`. Removing a missing key is not
    /// an error.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;

    /// Remove every value in the namespace.
    fn clear(&mut self) -> Result<(), StorageError>;
}

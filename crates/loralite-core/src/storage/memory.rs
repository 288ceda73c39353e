//! In-memory key/value backend for tests and simulation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{KvStore, StorageError};

/// `HashMap`-backed store.
///
/// State lives behind `Arc<Mutex<_>>` so a test can keep a clone of the
/// store and inspect what the session layer persisted (blob sizes,
/// ciphertext opacity) while the layer owns the other handle. Uses
/// `lock().expect()` which panics on a poisoned mutex — acceptable for
/// test/simulation code.
#[derive(Clone, Default)]
pub struct MemoryKv {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryKv {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("mutex poisoned").len()
    }

    /// True if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKv {
    #[allow(clippy::expect_used)]
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.inner.lock().expect("mutex poisoned").insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.inner.lock().expect("mutex poisoned").get(key).cloned())
    }

    #[allow(clippy::expect_used)]
    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.inner.lock().expect("mutex poisoned").remove(key);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn clear(&mut self) -> Result<(), StorageError> {
        self.inner.lock().expect("mutex poisoned").clear();
        Ok(())
    }
}

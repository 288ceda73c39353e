//! Filesystem collaborator contract for group files.
//!
//! Group files live in a flat namespace (`<prefix>_<suffix>.bin`). The
//! trait carries exactly the operations the buffer consumes; backends are
//! [`DirFs`] over a real directory and [`MemoryFs`] for tests.

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use thiserror::Error;

/// Filesystem failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    /// File does not exist.
    #[error("no such file: {0}")]
    NotFound(String),

    /// Underlying I/O failure.
    #[error("filesystem error on {name}: {message}")]
    Io {
        /// File the operation touched.
        name: String,
        /// Backend error text.
        message: String,
    },
}

/// Flat-namespace append-oriented file store.
pub trait FileStore {
    /// Append bytes to `name`, creating it if missing.
    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), FsError>;

    /// Read the whole file.
    fn read(&self, name: &str) -> Result<Vec<u8>, FsError>;

    /// Current size in bytes; zero for a missing file.
    fn size(&self, name: &str) -> Result<usize, FsError>;

    /// True if the file exists.
    fn exists(&self, name: &str) -> bool;

    /// Delete the file. Deleting a missing file is not an error.
    fn remove(&mut self, name: &str) -> Result<(), FsError>;
}

/// In-memory file store for tests and simulation.
///
/// State behind `Arc<Mutex<_>>` so tests can hold an observing clone.
/// Panics on a poisoned mutex; acceptable for test code.
#[derive(Clone, Default)]
pub struct MemoryFs {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryFs {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all stored files, unordered.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        self.inner.lock().expect("mutex poisoned").keys().cloned().collect()
    }
}

impl FileStore for MemoryFs {
    #[allow(clippy::expect_used)]
    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), FsError> {
        self.inner
            .lock()
            .expect("mutex poisoned")
            .entry(name.to_owned())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn read(&self, name: &str) -> Result<Vec<u8>, FsError> {
        self.inner
            .lock()
            .expect("mutex poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::NotFound(name.to_owned()))
    }

    #[allow(clippy::expect_used)]
    fn size(&self, name: &str) -> Result<usize, FsError> {
        Ok(self.inner.lock().expect("mutex poisoned").get(name).map_or(0, Vec::len))
    }

    #[allow(clippy::expect_used)]
    fn exists(&self, name: &str) -> bool {
        self.inner.lock().expect("mutex poisoned").contains_key(name)
    }

    #[allow(clippy::expect_used)]
    fn remove(&mut self, name: &str) -> Result<(), FsError> {
        self.inner.lock().expect("mutex poisoned").remove(name);
        Ok(())
    }
}

/// File store over a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    /// Store files under `root`. The directory must already exist.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn io_err(name: &str, err: &std::io::Error) -> FsError {
        FsError::Io { name: name.to_owned(), message: err.to_string() }
    }
}

impl FileStore for DirFs {
    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), FsError> {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.path(name))
            .map_err(|e| Self::io_err(name, &e))?;
        file.write_all(data).map_err(|e| Self::io_err(name, &e))
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, FsError> {
        match fs::read(self.path(name)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FsError::NotFound(name.to_owned()))
            }
            Err(e) => Err(Self::io_err(name, &e)),
        }
    }

    fn size(&self, name: &str) -> Result<usize, FsError> {
        match fs::metadata(self.path(name)) {
            Ok(meta) => Ok(meta.len() as usize),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(Self::io_err(name, &e)),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    fn remove(&mut self, name: &str) -> Result<(), FsError> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(name, &e)),
        }
    }
}

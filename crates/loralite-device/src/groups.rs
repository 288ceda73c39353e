//! Store-and-forward group-file buffer.
//!
//! Small payloads are staged into rotating files per logical group so the
//! radio sends one batched frame instead of many tiny ones. Files are
//! named `<prefix>_<suffix>.bin` with the suffix starting at 0; each
//! holds length-prefixed [`Record`]s.
//!
//! # Invariants
//!
//! - No file ever exceeds `max_file_size` bytes.
//! - At most `group_prefix_limit` suffixes exist per prefix; appending
//!   past that quota fails with [`BufferError::BufferFull`].
//! - At most `group_limit` distinct prefixes (bounded by the trailing
//!   digit of the prefix name).

use loralite_core::config::GroupConfig;
use loralite_proto::{DataType, ProtocolError, Record};
use thiserror::Error;

use crate::fs::{FileStore, FsError};

/// Group-buffer failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Suffix quota for the prefix is exhausted.
    #[error("group file quota exhausted for {prefix} (limit {limit})")]
    BufferFull {
        /// Group prefix whose quota ran out.
        prefix: String,
        /// Configured suffix limit.
        limit: usize,
    },

    /// Prefix does not end in a digit naming a configured group.
    #[error("invalid group prefix {0:?}")]
    InvalidGroup(String),

    /// A single record cannot fit any file under the configured limit.
    #[error("record of {size} bytes exceeds max file size {max}")]
    RecordTooLarge {
        /// On-disk size of the record.
        size: usize,
        /// Configured `max_file_size`.
        max: usize,
    },

    /// Stored file contains no decodable records.
    #[error("group file {0} holds no valid records")]
    EmptyFile(String),

    /// Stored file is corrupt.
    #[error("group file corrupt: {0}")]
    Corrupt(#[from] ProtocolError),

    /// Filesystem collaborator failed.
    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Size-bounded append-only batching of typed payloads.
///
/// Suffix counters are process-lifetime state: they track where appends
/// go across calls, and reset when a prefix's files have all been
/// drained.
pub struct GroupStore<F: FileStore> {
    fs: F,
    config: GroupConfig,
    suffixes: Vec<usize>,
}

impl<F: FileStore> GroupStore<F> {
    /// Create a buffer over the given file store.
    ///
    /// `config` must already have passed [`GroupConfig::validate`]; the
    /// end device checks it at construction.
    pub fn new(fs: F, config: GroupConfig) -> Self {
        let suffixes = vec![0; config.group_limit];
        Self { fs, config, suffixes }
    }

    /// File name for a prefix/suffix pair.
    #[must_use]
    pub fn file_name(prefix: &str, suffix: usize) -> String {
        format!("{prefix}_{suffix}.bin")
    }

    /// Resolve the group index from the trailing digit of the prefix
    /// (1-based, e.g. `"Grp1"` is index 0).
    fn group_index(&self, prefix: &str) -> Result<usize, BufferError> {
        let digit = prefix
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| BufferError::InvalidGroup(prefix.to_owned()))?;
        let index = (digit as usize)
            .checked_sub(1)
            .ok_or_else(|| BufferError::InvalidGroup(prefix.to_owned()))?;
        if index >= self.config.group_limit {
            return Err(BufferError::InvalidGroup(prefix.to_owned()));
        }
        Ok(index)
    }

    /// Append one typed payload to the group's current file.
    ///
    /// Rotates to the next suffix when the record would push the current
    /// file past `max_file_size`.
    ///
    /// # Errors
    ///
    /// - [`BufferError::InvalidGroup`] for an unconfigured prefix.
    /// - [`BufferError::RecordTooLarge`] if the record alone cannot fit.
    /// - [`BufferError::BufferFull`] once the suffix quota is exhausted.
    pub fn store_packet(
        &mut self,
        data: &[u8],
        data_type: DataType,
        prefix: &str,
    ) -> Result<(), BufferError> {
        let index = self.group_index(prefix)?;

        let record = Record { data_type, payload: data.to_vec() };
        let record_len = record.encoded_len();
        if record_len > self.config.max_file_size || data.len() + 1 > usize::from(u16::MAX) {
            return Err(BufferError::RecordTooLarge {
                size: record_len,
                max: self.config.max_file_size,
            });
        }

        let mut suffix = self.suffixes[index];
        if suffix >= self.config.group_prefix_limit {
            return Err(BufferError::BufferFull {
                prefix: prefix.to_owned(),
                limit: self.config.group_prefix_limit,
            });
        }

        let mut name = Self::file_name(prefix, suffix);
        let current = self.fs.size(&name)?;

        if current + record_len > self.config.max_file_size {
            suffix += 1;
            if suffix >= self.config.group_prefix_limit {
                return Err(BufferError::BufferFull {
                    prefix: prefix.to_owned(),
                    limit: self.config.group_prefix_limit,
                });
            }
            self.suffixes[index] = suffix;
            name = Self::file_name(prefix, suffix);
            tracing::info!(file = %name, "rotated to next group file");
        }

        let mut buf = Vec::with_capacity(record_len);
        record.write_to(&mut buf);
        self.fs.append(&name, &buf)?;

        tracing::debug!(file = %name, bytes = record_len, "record stored");
        Ok(())
    }

    /// Lowest suffix with an existing file, if any.
    #[must_use]
    pub fn lowest_suffix(&self, prefix: &str) -> Option<usize> {
        (0..self.config.group_prefix_limit)
            .find(|&suffix| self.fs.exists(&Self::file_name(prefix, suffix)))
    }

    /// True if the named group file exists.
    #[must_use]
    pub fn has_file(&self, name: &str) -> bool {
        self.fs.exists(name)
    }

    /// Load a file and flatten its records into the transmit plaintext:
    /// each record contributes its type byte followed by its payload, no
    /// per-record length.
    ///
    /// # Errors
    ///
    /// - [`BufferError::Corrupt`] if a record fails to parse.
    /// - [`BufferError::EmptyFile`] for a file with no records.
    pub fn load_plaintext(&self, name: &str) -> Result<Vec<u8>, BufferError> {
        let image = self.fs.read(name)?;
        let records = Record::read_all(&image)?;
        if records.is_empty() {
            return Err(BufferError::EmptyFile(name.to_owned()));
        }

        let mut plaintext =
            Vec::with_capacity(records.iter().map(|r| 1 + r.payload.len()).sum());
        for record in &records {
            plaintext.push(record.data_type as u8);
            plaintext.extend_from_slice(&record.payload);
        }
        Ok(plaintext)
    }

    /// Delete a drained file.
    ///
    /// # Errors
    ///
    /// Propagates filesystem failures.
    pub fn remove_file(&mut self, name: &str) -> Result<(), BufferError> {
        self.fs.remove(name)?;
        Ok(())
    }

    /// Reset the group's suffix counter if no files remain for the
    /// prefix, reclaiming the quota after a full drain.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidGroup`] for an unconfigured prefix.
    pub fn reclaim(&mut self, prefix: &str) -> Result<(), BufferError> {
        let index = self.group_index(prefix)?;
        if self.lowest_suffix(prefix).is_none() {
            self.suffixes[index] = 0;
        }
        Ok(())
    }

    /// Current append suffix for a prefix.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidGroup`] for an unconfigured prefix.
    pub fn current_suffix(&self, prefix: &str) -> Result<usize, BufferError> {
        Ok(self.suffixes[self.group_index(prefix)?])
    }
}

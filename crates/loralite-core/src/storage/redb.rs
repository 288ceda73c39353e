//! Redb-backed durable key/value backend.
//!
//! Holds only the database path: the database is opened for each
//! operation and closed before returning, matching the collaborator
//! contract (the original platform's preference store worked the same
//! way — begin, touch one key, end).

use std::path::PathBuf;

use redb::{Database, TableDefinition};

use super::{KvStore, StorageError};

/// Single table, named after the store namespace.
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("lora");

/// Durable store backed by a redb database file.
#[derive(Debug, Clone)]
pub struct RedbKv {
    path: PathBuf,
}

impl RedbKv {
    /// Use (or create on first write) the database at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> Result<Database, StorageError> {
        Database::create(&self.path).map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

impl KvStore for RedbKv {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let db = self.open()?;
        let txn = db.begin_write().map_err(|e| StorageError::Unavailable(e.to_string()))?;
        {
            let mut table =
                txn.open_table(SESSIONS).map_err(|e| StorageError::Unavailable(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Unavailable(e.to_string()))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let db = self.open()?;
        let txn = db.begin_read().map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let table = match txn.open_table(SESSIONS) {
            Ok(table) => table,
            // A database that has never stored a session has no table yet.
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(StorageError::Unavailable(e.to_string())),
        };

        let value = table.get(key).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let db = self.open()?;
        let txn = db.begin_write().map_err(|e| StorageError::Unavailable(e.to_string()))?;
        {
            let mut table =
                txn.open_table(SESSIONS).map_err(|e| StorageError::Unavailable(e.to_string()))?;
            table.remove(key).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Unavailable(e.to_string()))
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        let db = self.open()?;
        let txn = db.begin_write().map_err(|e| StorageError::Unavailable(e.to_string()))?;
        match txn.delete_table(SESSIONS) {
            Ok(_) => {}
            Err(e) => return Err(StorageError::Unavailable(e.to_string())),
        }
        txn.commit().map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, RedbKv) {
        let dir = tempfile::tempdir().expect("tempdir");
        let kv = RedbKv::new(dir.path().join("sessions.redb"));
        (dir, kv)
    }

    #[test]
    fn get_from_fresh_database_is_none() {
        let (_dir, kv) = temp_store();
        assert_eq!(kv.get("anything").unwrap(), None);
    }

    #[test]
    fn put_get_round_trip() {
        let (_dir, mut kv) = temp_store();
        kv.put("0011223344556677", &[0xAB; 32]).unwrap();
        assert_eq!(kv.get("0011223344556677").unwrap(), Some(vec![0xAB; 32]));
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.redb");

        let mut kv = RedbKv::new(&path);
        kv.put("k", &[1, 2, 3]).unwrap();
        drop(kv);

        let kv = RedbKv::new(&path);
        assert_eq!(kv.get("k").unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn remove_and_clear() {
        let (_dir, mut kv) = temp_store();
        kv.put("a", &[1]).unwrap();
        kv.put("b", &[2]).unwrap();

        kv.remove("a").unwrap();
        assert_eq!(kv.get("a").unwrap(), None);
        assert_eq!(kv.get("b").unwrap(), Some(vec![2]));

        kv.clear().unwrap();
        assert_eq!(kv.get("b").unwrap(), None);
    }
}

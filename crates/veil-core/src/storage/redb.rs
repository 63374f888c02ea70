//! Redb-backed durable slot storage.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety, so an
//! identity is never persisted half-written.

use std::{path::Path, sync::Arc};

use redb::{Database, TableDefinition};

use super::{KeyValueStore, StorageError};

/// Table: slots
/// Key: slot name
/// Value: slot contents (base64 key material)
const SLOTS: TableDefinition<&str, &str> = TableDefinition::new("slots");

/// Durable slot storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbKeyStore {
    db: Arc<Database>,
}

impl RedbKeyStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates the slots table if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(SLOTS).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KeyValueStore for RedbKeyStore {
    fn get(&self, slot: &str) -> Result<Option<String>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(SLOTS).map_err(io)?;

        let value = table.get(slot).map_err(io)?;
        Ok(value.map(|guard| guard.value().to_string()))
    }

    fn put_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(SLOTS).map_err(io)?;
            for (slot, value) in entries {
                table.insert(*slot, *value).map_err(io)?;
            }
        }
        txn.commit().map_err(io)?;
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(SLOTS).map_err(io)?;
            table.remove(slot).map_err(io)?;
        }
        txn.commit().map_err(io)?;
        Ok(())
    }
}

fn io(err: impl std::fmt::Display) -> StorageError {
    StorageError::Io(err.to_string())
}

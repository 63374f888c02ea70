#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{KeyValueStore, StorageError};

/// In-memory slot storage for tests and ephemeral sessions.
///
/// All state is wrapped in Arc<Mutex<>> so clones observe the same slots. A
/// write counter lets tests assert that loading an identity does not write.
#[derive(Clone, Default)]
pub struct MemoryKeyStore {
    inner: Arc<Mutex<MemoryKeyStoreInner>>,
}

#[derive(Default)]
struct MemoryKeyStoreInner {
    slots: HashMap<String, String>,
    writes: usize,
}

impl MemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    pub fn slot_count(&self) -> Result<usize, StorageError> {
        Ok(self.inner.lock().map_err(|_| StorageError::Poisoned)?.slots.len())
    }

    /// Number of `put_many` calls so far.
    pub fn write_count(&self) -> Result<usize, StorageError> {
        Ok(self.inner.lock().map_err(|_| StorageError::Poisoned)?.writes)
    }
}

impl KeyValueStore for MemoryKeyStore {
    fn get(&self, slot: &str) -> Result<Option<String>, StorageError> {
        let inner = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(inner.slots.get(slot).cloned())
    }

    fn put_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        for (slot, value) in entries {
            inner.slots.insert((*slot).to_string(), (*value).to_string());
        }
        inner.writes += 1;
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        inner.slots.remove(slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_slots() {
        let store = MemoryKeyStore::new();
        let clone = store.clone();

        store.put("a", "1").unwrap();

        assert_eq!(clone.get("a").unwrap(), Some("1".to_string()));
        assert_eq!(clone.slot_count().unwrap(), 1);
    }

    #[test]
    fn put_many_counts_as_one_write() {
        let store = MemoryKeyStore::new();

        store.put_many(&[("a", "1"), ("b", "2")]).unwrap();

        assert_eq!(store.write_count().unwrap(), 1);
        assert_eq!(store.slot_count().unwrap(), 2);
    }

    #[test]
    fn remove_absent_slot_is_noop() {
        let store = MemoryKeyStore::new();
        store.remove("missing").unwrap();
        assert_eq!(store.get("missing").unwrap(), None);
    }
}

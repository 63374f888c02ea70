//! Local persistent storage for device secrets.
//!
//! A small slot-addressed key/value abstraction. The trait is synchronous
//! (no async): writes are tiny and happen once per identity lifetime.

mod error;
mod memory;
mod redb;

pub use error::StorageError;
pub use memory::MemoryKeyStore;

pub use self::redb::RedbKeyStore;

/// String-valued slot storage.
///
/// Must be Clone (shared by the identity store and the caller) and Send +
/// Sync. Implementations share internal state via Arc, so clones access the
/// same underlying storage.
pub trait KeyValueStore: Clone + Send + Sync + 'static {
    /// Read a slot. `None` if it was never written or has been removed.
    fn get(&self, slot: &str) -> Result<Option<String>, StorageError>;

    /// Write several slots.
    ///
    /// # Invariants
    ///
    /// - Post: either all entries are persisted or none are, where the
    ///   back end supports transactions
    fn put_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError>;

    /// Write one slot, replacing any previous value.
    fn put(&self, slot: &str, value: &str) -> Result<(), StorageError> {
        self.put_many(&[(slot, value)])
    }

    /// Remove a slot. Removing an absent slot is a no-op.
    fn remove(&self, slot: &str) -> Result<(), StorageError>;
}

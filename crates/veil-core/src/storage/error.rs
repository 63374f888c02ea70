//! Storage error types.

use thiserror::Error;

/// Errors from local persistent storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying database or filesystem failure.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// A thread panicked while holding the storage lock.
    #[error("storage lock poisoned")]
    Poisoned,
}

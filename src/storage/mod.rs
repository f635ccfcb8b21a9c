//! Durable backup storage
//!
//! A string-keyed store with no transactional guarantees, standing in for
//! browser local storage. Values written here are recovery hints only; the
//! in-memory state of [`crate::session::SessionCache`] stays authoritative.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Durable storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing document could not be parsed
    #[error("Storage document is corrupt: {0}")]
    Corrupt(String),

    #[error("Storage encryption failed: {0}")]
    Crypto(String),
}

/// String-keyed get/set/delete storage shared process-wide
///
/// Callers namespace their keys; implementations do not.
pub trait BackupStore: Send + Sync {
    /// Read a value
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be written
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value; deleting a missing key is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be written
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

//! Key-value blob store interface and implementations.
//!
//! Voice profiles are persisted as opaque blobs keyed by identity. This crate
//! provides the trait-based store interface with an in-memory implementation
//! for testing and a redb-based implementation for persistence.
//!
//! `set` always replaces the whole value: a concurrent reader sees either the
//! previous blob or the new one, never a partial write.

pub mod memory;
pub mod redb;

use std::fmt;
use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Error, Debug)]
pub enum KvError {
    #[error("kv: storage error: {0}")]
    Storage(String),
}

/// Result type for store operations.
pub type KvResult<T> = Result<T, KvError>;

/// Key-value blob store.
///
/// Keys are strings, values are opaque byte blobs. Implementations must be
/// safe for concurrent use; a write to an existing key replaces its value
/// wholesale.
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns `None` when the key is absent.
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>>;

    /// Set a key to a value, overwriting any previous value.
    fn set(&self, key: &str, value: &[u8]) -> KvResult<()>;

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> KvResult<()>;

    /// List all keys with the given prefix, sorted.
    fn scan_keys(&self, prefix: &str) -> KvResult<Vec<String>>;
}

impl fmt::Debug for dyn KvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KvStore {{ ... }}")
    }
}

pub use memory::MemoryStore;
pub use redb::RedbStore;

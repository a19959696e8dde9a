//! Persistent storage abstraction.
//!
//! The persistent tier stores opaque byte payloads keyed by string. Anything
//! that can do durable key/value reads and writes can back it; the crate
//! ships a JSON-file backend and an LMDB backend.

use async_trait::async_trait;
use thiserror::Error;

/// Failure surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Durable key/value store for serialized cache entries.
///
/// Implementations must make `put` atomic per key: a reader never observes a
/// half-written payload, only the old value or the new one.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BackendError>;

    /// Remove `key`. Returns whether an entry was present.
    async fn delete(&self, key: &str) -> Result<bool, BackendError>;

    async fn list_keys(&self) -> Result<Vec<String>, BackendError>;
}

// ============================================================================
// TEST SUPPORT
// ============================================================================

//! LMDB storage backend.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped
//! key/value store. A better fit than the file backend when many keys are
//! cached, since every operation is a single ACID transaction instead of a
//! directory walk.

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use std::path::Path;

use crate::backend::{BackendError, StorageBackend};

/// Default maximum database size in megabytes.
pub const DEFAULT_MAP_SIZE_MB: usize = 256;

/// LMDB-backed persistent store.
pub struct LmdbBackend {
    env: Env,
    db: Database<Str, Bytes>,
}

impl LmdbBackend {
    /// Open or create the database at `path`.
    ///
    /// `max_size_mb` bounds the memory map; LMDB refuses writes past it.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, BackendError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| BackendError::Storage(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        Ok(Self { env, db })
    }

    /// Open with the default size bound.
    pub fn open_default<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        Self::new(path, DEFAULT_MAP_SIZE_MB)
    }
}

#[async_trait]
impl StorageBackend for LmdbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        let value = self
            .db
            .get(&rtxn, key)
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        Ok(value.map(|bytes| bytes.to_vec()))
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BackendError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        self.db
            .put(&mut wtxn, key, bytes)
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| BackendError::Storage(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<bool, BackendError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        let removed = self
            .db
            .delete(&mut wtxn, key)
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        Ok(removed)
    }

    async fn list_keys(&self) -> Result<Vec<String>, BackendError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| BackendError::Storage(e.to_string()))?;

        let mut keys = Vec::new();
        for result in iter {
            let (key, _) = result.map_err(|e| BackendError::Storage(e.to_string()))?;
            keys.push(key.to_string());
        }
        Ok(keys)
    }
}

// ============================================================================
// TESTS
// ============================================================================

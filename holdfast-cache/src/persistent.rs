//! Persistent cache tier over a pluggable storage backend.
//!
//! Entries are serialized as pretty-printed JSON [`PersistedEntry`] payloads
//! so cache files stay inspectable. Reads never propagate backend or decode
//! failures: a broken entry is logged and treated as a miss, because the
//! caller can always fall through to the upstream provider.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use holdfast_core::{Cacheable, PersistedEntry};

use crate::backend::StorageBackend;

/// Freshness report for one persisted key, without deserializing the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub exists: bool,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_ms: Option<u64>,
}

impl CacheInfo {
    /// Report for a key with no usable entry. `expired` is set so callers
    /// asking "do I need a refresh" get a yes.
    pub fn absent() -> Self {
        Self {
            exists: false,
            expired: true,
            generation_tag: None,
            age_ms: None,
        }
    }
}

/// Durable second tier. Survives process restarts.
#[derive(Clone)]
pub struct PersistentCache {
    backend: Arc<dyn StorageBackend>,
}

impl PersistentCache {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Persist `data` under `key`. The entry is stamped with the value's own
    /// generation label. Failures are logged and swallowed; losing a cache
    /// write must never fail the operation that produced the data.
    pub async fn set<T: Cacheable>(&self, key: &str, data: &T, ttl: Duration) {
        let entry = PersistedEntry::new(data.clone(), ttl, data.generation());
        let bytes = match serde_json::to_vec_pretty(&entry) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key, error = %err, "failed to serialize cache entry, skipping persist");
                return;
            }
        };
        if let Err(err) = self.backend.put(key, &bytes).await {
            warn!(key, error = %err, "failed to persist cache entry");
        }
    }

    /// Fresh value for `key`, if one exists.
    pub async fn get<T: Cacheable>(&self, key: &str) -> Option<T> {
        let entry = self.read_entry::<T>(key).await?;
        if entry.is_fresh() {
            Some(entry.data)
        } else {
            None
        }
    }

    /// Value for `key` regardless of freshness.
    pub async fn get_stale<T: Cacheable>(&self, key: &str) -> Option<T> {
        self.read_entry::<T>(key).await.map(|entry| entry.data)
    }

    /// Whether a fresh entry exists for `key`.
    pub async fn has(&self, key: &str) -> bool {
        match self.read_entry::<serde_json::Value>(key).await {
            Some(entry) => entry.is_fresh(),
            None => false,
        }
    }

    /// Freshness metadata for `key`. Reads the entry envelope only; the
    /// payload is kept as raw JSON.
    pub async fn cache_info(&self, key: &str) -> CacheInfo {
        match self.read_entry::<serde_json::Value>(key).await {
            Some(entry) => CacheInfo {
                exists: true,
                expired: !entry.is_fresh(),
                generation_tag: entry.generation_tag.clone(),
                age_ms: Some(entry.age_ms()),
            },
            None => CacheInfo::absent(),
        }
    }

    /// Remove `key`. Returns whether an entry was present.
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(key, error = %err, "failed to delete cache entry");
                false
            }
        }
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        let keys = match self.backend.list_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "failed to list cache entries for clear");
                return;
            }
        };
        for key in keys {
            self.delete(&key).await;
        }
    }

    /// Remove expired and unreadable entries. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let keys = match self.backend.list_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "failed to list cache entries for cleanup");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            let sweep = match self.backend.get(&key).await {
                Ok(Some(bytes)) => {
                    match serde_json::from_slice::<PersistedEntry<serde_json::Value>>(&bytes) {
                        Ok(entry) => !entry.is_fresh(),
                        // Undecodable entries can never be served, sweep them too.
                        Err(_) => true,
                    }
                }
                Ok(None) => false,
                Err(err) => {
                    warn!(key, error = %err, "skipping unreadable entry during cleanup");
                    false
                }
            };
            if sweep && self.delete(&key).await {
                removed += 1;
            }
        }
        removed
    }

    async fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Option<PersistedEntry<T>> {
        let bytes = match self.backend.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "persistent read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(key, error = %err, "corrupted cache entry, treating as miss");
                None
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{make_test_doc, MockBackend, TestDoc};
    use chrono::Utc;

    const TTL: Duration = Duration::from_secs(3600);

    fn create_test_cache() -> (PersistentCache, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::new());
        (PersistentCache::new(backend.clone()), backend)
    }

    async fn seed_backdated(
        backend: &MockBackend,
        key: &str,
        doc: &TestDoc,
        age: chrono::Duration,
        ttl_ms: u64,
    ) {
        let entry = PersistedEntry {
            data: doc.clone(),
            created_at: Utc::now() - age,
            ttl_ms,
            generation_tag: doc.generation(),
        };
        let bytes = serde_json::to_vec(&entry).expect("serialize should succeed");
        backend.put(key, &bytes).await.expect("seed put should succeed");
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (cache, _backend) = create_test_cache();
        let doc = make_test_doc(1);

        cache.set("holdings", &doc, TTL).await;

        assert_eq!(cache.get::<TestDoc>("holdings").await, Some(doc));
        assert!(cache.has("holdings").await);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (cache, _backend) = create_test_cache();
        assert_eq!(cache.get::<TestDoc>("absent").await, None);
        assert!(!cache.has("absent").await);
    }

    #[tokio::test]
    async fn test_expired_entry_invisible_to_get_but_not_get_stale() {
        let (cache, backend) = create_test_cache();
        let doc = make_test_doc(1);
        seed_backdated(&backend, "holdings", &doc, chrono::Duration::hours(2), 1000).await;

        assert_eq!(cache.get::<TestDoc>("holdings").await, None);
        assert!(!cache.has("holdings").await);
        assert_eq!(cache.get_stale::<TestDoc>("holdings").await, Some(doc));
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_a_miss() {
        let (cache, backend) = create_test_cache();
        backend
            .put("holdings", b"{ not valid json")
            .await
            .expect("put should succeed");

        assert_eq!(cache.get::<TestDoc>("holdings").await, None);
        assert_eq!(cache.get_stale::<TestDoc>("holdings").await, None);
    }

    #[tokio::test]
    async fn test_cache_info_for_fresh_entry() {
        let (cache, _backend) = create_test_cache();
        cache.set("holdings", &make_test_doc(3), TTL).await;

        let info = cache.cache_info("holdings").await;

        assert!(info.exists);
        assert!(!info.expired);
        assert_eq!(info.generation_tag, Some("v3".to_string()));
        assert!(info.age_ms.is_some());
    }

    #[tokio::test]
    async fn test_cache_info_for_expired_entry() {
        let (cache, backend) = create_test_cache();
        let doc = make_test_doc(2);
        seed_backdated(&backend, "holdings", &doc, chrono::Duration::days(10), 1000).await;

        let info = cache.cache_info("holdings").await;

        assert!(info.exists);
        assert!(info.expired);
        assert_eq!(info.generation_tag, Some("v2".to_string()));
        let age = info.age_ms.expect("age should exist");
        assert!(age >= 10 * 24 * 60 * 60 * 1000);
    }

    #[tokio::test]
    async fn test_cache_info_for_absent_entry() {
        let (cache, _backend) = create_test_cache();
        let info = cache.cache_info("absent").await;
        assert_eq!(info, CacheInfo::absent());
        assert!(info.expired);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let (cache, _backend) = create_test_cache();
        cache.set("holdings", &make_test_doc(1), TTL).await;

        assert!(cache.delete("holdings").await);
        assert!(!cache.delete("holdings").await);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let (cache, _backend) = create_test_cache();
        cache.set("a", &make_test_doc(1), TTL).await;
        cache.set("b", &make_test_doc(2), TTL).await;

        cache.clear().await;

        assert_eq!(cache.get::<TestDoc>("a").await, None);
        assert_eq!(cache.get_stale::<TestDoc>("b").await, None);
    }

    #[tokio::test]
    async fn test_cleanup_sweeps_expired_and_corrupt() {
        let (cache, backend) = create_test_cache();
        cache.set("fresh", &make_test_doc(1), TTL).await;
        seed_backdated(
            &backend,
            "expired",
            &make_test_doc(2),
            chrono::Duration::days(2),
            1000,
        )
        .await;
        backend.put("corrupt", b"garbage").await.expect("put should succeed");

        let removed = cache.cleanup().await;

        assert_eq!(removed, 2);
        assert_eq!(cache.get::<TestDoc>("fresh").await, Some(make_test_doc(1)));
        assert_eq!(cache.get_stale::<TestDoc>("expired").await, None);
    }

    #[tokio::test]
    async fn test_backend_write_failure_does_not_panic() {
        let (cache, backend) = create_test_cache();
        backend.fail_writes(true);

        cache.set("holdings", &make_test_doc(1), TTL).await;

        backend.fail_writes(false);
        assert_eq!(cache.get::<TestDoc>("holdings").await, None);
    }

    #[tokio::test]
    async fn test_backend_read_failure_is_a_miss() {
        let (cache, backend) = create_test_cache();
        cache.set("holdings", &make_test_doc(1), TTL).await;
        backend.fail_reads(true);

        assert_eq!(cache.get::<TestDoc>("holdings").await, None);
        assert_eq!(cache.cache_info("holdings").await, CacheInfo::absent());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_generation() {
        let (cache, backend) = create_test_cache();
        let doc = make_test_doc(7);
        cache.set("holdings", &doc, TTL).await;

        let raw = backend
            .get("holdings")
            .await
            .expect("get should succeed")
            .expect("entry should exist");
        let text = String::from_utf8(raw).expect("utf8");
        assert!(text.contains("\"generationTag\": \"v7\""));
    }
}

//! In-memory cache tier.
//!
//! A plain map behind an `RwLock`. Expired entries become invisible to
//! [`MemoryCache::get`] and [`MemoryCache::has`] but stay in the map until a
//! [`MemoryCache::cleanup`] pass or an explicit delete removes them, so
//! [`MemoryCache::get_stale`] can still surface them as a fallback.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use holdfast_core::CacheEntry;

/// Point-in-time statistics for the memory tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryCacheStats {
    pub total_entries: usize,
    pub active_entries: usize,
    pub expired_entries: usize,
    pub oldest_created_at: Option<DateTime<Utc>>,
    pub newest_created_at: Option<DateTime<Utc>>,
}

/// Fast first tier. Lock poisoning degrades to misses and dropped writes
/// rather than panics.
#[derive(Debug)]
pub struct MemoryCache<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T> Default for MemoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone> MemoryCache<T> {
    pub fn set(&self, key: &str, data: T, ttl: Duration) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), CacheEntry::new(key, data, ttl));
        }
    }

    /// Fresh value for `key`, if one exists. Expired entries are left in
    /// place for [`MemoryCache::get_stale`].
    pub fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.data.clone())
    }

    /// Value for `key` regardless of freshness.
    pub fn get_stale(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().ok()?;
        entries.get(key).map(|entry| entry.data.clone())
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.get(key).is_some_and(|entry| entry.is_fresh()))
            .unwrap_or(false)
    }

    /// Remove `key` outright. Returns whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        self.entries
            .write()
            .map(|mut entries| entries.remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physically remove expired entries. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh());
        before - entries.len()
    }

    pub fn stats(&self) -> MemoryCacheStats {
        let Ok(entries) = self.entries.read() else {
            return MemoryCacheStats {
                total_entries: 0,
                active_entries: 0,
                expired_entries: 0,
                oldest_created_at: None,
                newest_created_at: None,
            };
        };
        let now = Utc::now();
        let active = entries
            .values()
            .filter(|entry| entry.is_fresh_at(now))
            .count();
        MemoryCacheStats {
            total_entries: entries.len(),
            active_entries: active,
            expired_entries: entries.len() - active,
            oldest_created_at: entries.values().map(|entry| entry.created_at).min(),
            newest_created_at: entries.values().map(|entry| entry.created_at).max(),
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, entry: CacheEntry<T>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(entry.key.clone(), entry);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Cache entry types shared by the memory and persistent tiers.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Marker trait for values that can live in the cache tiers.
///
/// The `generation` hook lets a value label itself with the reporting period
/// it belongs to (a quarter like `"Q1 2025"`). The persistent tier records
/// the label next to the payload so operators can see which period a cache
/// file holds without deserializing it.
pub trait Cacheable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn generation(&self) -> Option<String> {
        None
    }
}

// ============================================================================
// MEMORY TIER ENTRY
// ============================================================================

/// A value held in the in-memory tier with its freshness bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub key: String,
    pub data: T,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, data: T, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            data,
            created_at: Utc::now(),
            ttl,
        }
    }

    /// Age of the entry at `now`. Saturates to zero if `now` is earlier than
    /// the recorded creation time.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn age(&self) -> Duration {
        self.age_at(Utc::now())
    }

    /// An entry is fresh while its age has not exceeded its TTL. An entry
    /// whose age equals its TTL exactly is still fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.age_at(now) <= self.ttl
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

// ============================================================================
// PERSISTENT TIER ENTRY
// ============================================================================

/// On-disk representation of a cached value.
///
/// Stored as JSON with camelCase keys and the TTL flattened to milliseconds,
/// so cache files stay readable with ordinary tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry<T> {
    pub data: T,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "ttl")]
    pub ttl_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_tag: Option<String>,
}

impl<T> PersistedEntry<T> {
    pub fn new(data: T, ttl: Duration, generation_tag: Option<String>) -> Self {
        Self {
            data,
            created_at: Utc::now(),
            ttl_ms: ttl.as_millis() as u64,
            generation_tag,
        }
    }

    pub fn age_ms_at(&self, now: DateTime<Utc>) -> u64 {
        now.signed_duration_since(self.created_at)
            .num_milliseconds()
            .max(0) as u64
    }

    pub fn age_ms(&self) -> u64 {
        self.age_ms_at(Utc::now())
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.age_ms_at(now) <= self.ttl_ms
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_entry(created_secs_ago: i64, ttl_secs: u64) -> CacheEntry<String> {
        CacheEntry {
            key: "test-key".to_string(),
            data: "payload".to_string(),
            created_at: Utc::now() - chrono::Duration::seconds(created_secs_ago),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    #[test]
    fn test_new_entry_is_fresh() {
        let entry = CacheEntry::new("k", 42u32, Duration::from_secs(60));
        assert!(entry.is_fresh());
        assert_eq!(entry.key, "k");
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let entry = make_entry(61, 60);
        assert!(!entry.is_fresh());
    }

    #[test]
    fn test_entry_fresh_exactly_at_ttl() {
        let entry = make_entry(0, 60);
        let boundary = entry.created_at + chrono::Duration::seconds(60);
        assert!(entry.is_fresh_at(boundary));
        assert!(!entry.is_fresh_at(boundary + chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn test_age_saturates_on_backwards_clock() {
        let entry = make_entry(-30, 60);
        assert_eq!(entry.age(), Duration::ZERO);
        assert!(entry.is_fresh());
    }

    #[test]
    fn test_persisted_entry_freshness_boundary() {
        let entry = PersistedEntry::new("data".to_string(), Duration::from_millis(500), None);
        let boundary = entry.created_at + chrono::Duration::milliseconds(500);
        assert!(entry.is_fresh_at(boundary));
        assert!(!entry.is_fresh_at(boundary + chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn test_persisted_entry_json_shape() {
        let entry = PersistedEntry::new(
            vec![1u32, 2, 3],
            Duration::from_secs(90),
            Some("Q1 2025".to_string()),
        );
        let json = serde_json::to_value(&entry).expect("serialize should succeed");

        assert!(json.get("data").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json.get("ttl").and_then(|v| v.as_u64()), Some(90_000));
        assert_eq!(
            json.get("generationTag").and_then(|v| v.as_str()),
            Some("Q1 2025")
        );
    }

    #[test]
    fn test_persisted_entry_generation_tag_optional() {
        let json = r#"{"data":7,"createdAt":"2025-01-15T00:00:00Z","ttl":1000}"#;
        let entry: PersistedEntry<u32> =
            serde_json::from_str(json).expect("deserialize should succeed");
        assert_eq!(entry.data, 7);
        assert_eq!(entry.generation_tag, None);
    }

    proptest! {
        #[test]
        fn prop_freshness_matches_age_comparison(
            ttl_ms in 0u64..100_000,
            elapsed_ms in 0u64..200_000,
        ) {
            let entry = PersistedEntry::new((), Duration::from_millis(ttl_ms), None);
            let now = entry.created_at + chrono::Duration::milliseconds(elapsed_ms as i64);
            prop_assert_eq!(entry.is_fresh_at(now), elapsed_ms <= ttl_ms);
        }
    }
}

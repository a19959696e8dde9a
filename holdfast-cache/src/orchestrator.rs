//! Two-tier cache orchestration in front of a slow upstream provider.
//!
//! Lookup order: memory tier, persistent tier, upstream fetch. Persistent
//! hits are promoted back into memory. When the upstream fails after
//! retries, an expired persistent entry is served rather than nothing.
//! Concurrent lookups for the same key collapse into a single upstream
//! fetch and share its outcome, failures included.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use holdfast_core::{
    with_retry, CacheSettings, Cacheable, ProviderResult, RetryPolicy, UpstreamProvider,
};

use crate::memory::{MemoryCache, MemoryCacheStats};
use crate::persistent::{CacheInfo, PersistentCache};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// TTLs and retry budget for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Freshness window for the memory tier, also used when promoting
    /// persistent hits back into memory.
    pub memory_ttl: Duration,

    /// Freshness window for the persistent tier.
    pub persistent_ttl: Duration,

    /// Retry budget applied around every upstream fetch.
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            memory_ttl: settings.memory_ttl,
            persistent_ttl: settings.persistent_ttl,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

// ============================================================================
// STATUS REPORTING
// ============================================================================

/// Combined view of both tiers for one key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    /// Whether the memory tier holds a fresh value for the key.
    pub memory_has: bool,

    /// Statistics across all keys in the memory tier.
    pub memory: MemoryCacheStats,

    /// Freshness report for the key in the persistent tier.
    pub persistent: CacheInfo,

    /// True when nothing fresh is available anywhere, so the next read will
    /// go upstream.
    pub should_refresh: bool,

    /// Age of the persisted entry rendered in whole days, or `"unknown"`.
    pub data_age: String,
}

/// Entries removed by one cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub memory_removed: usize,
    pub persistent_removed: usize,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Per-key gate around one upstream fetch. The fetching task records its
/// outcome in the slot so tasks queued behind it observe the same result
/// instead of issuing their own fetch.
type FetchSlot<T> = Arc<Mutex<Option<ProviderResult<Option<T>>>>>;

/// Resilient read path over both cache tiers and the upstream provider.
pub struct CacheOrchestrator<T: Cacheable> {
    memory: MemoryCache<T>,
    persistent: PersistentCache,
    provider: Arc<dyn UpstreamProvider<T>>,
    config: OrchestratorConfig,
    // One gate per key with a fetch in flight, removed when it completes.
    inflight: DashMap<String, FetchSlot<T>>,
}

impl<T: Cacheable> CacheOrchestrator<T> {
    pub fn new(
        persistent: PersistentCache,
        provider: Arc<dyn UpstreamProvider<T>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            memory: MemoryCache::new(),
            persistent,
            provider,
            config,
            inflight: DashMap::new(),
        }
    }

    pub fn memory(&self) -> &MemoryCache<T> {
        &self.memory
    }

    /// Resolve `key` from the fastest source that has usable data.
    ///
    /// Returns `None` only when both tiers are empty and the upstream either
    /// had no data or failed with nothing stale to fall back on.
    pub async fn get_or_fetch(&self, key: &str) -> Option<T> {
        if let Some(value) = self.memory.get(key) {
            debug!(key, "memory cache hit");
            return Some(value);
        }

        if let Some(value) = self.persistent.get::<T>(key).await {
            debug!(key, "persistent cache hit, promoting to memory");
            self.memory.set(key, value.clone(), self.config.memory_ttl);
            return Some(value);
        }

        let slot = self.fetch_slot(key);
        let mut guard = slot.lock().await;

        // A concurrent fetch may have finished while we waited on the gate.
        // Successful fetches land in the memory tier; the slot carries the
        // outcome either way.
        if let Some(value) = self.memory.get(key) {
            debug!(key, "memory cache hit after in-flight fetch");
            return Some(value);
        }
        if let Some(outcome) = &*guard {
            debug!(key, "adopting the outcome of an in-flight fetch");
            return self.resolve_shared(key, outcome.clone()).await;
        }

        self.fetch_and_store(key, &mut guard).await
    }

    /// Drop both tiers for `key` and fetch anew.
    ///
    /// A refresh that fails or comes back empty returns whatever value was
    /// available before the caches were cleared, so forcing a refresh never
    /// yields less data than not forcing one.
    pub async fn force_refresh(&self, key: &str) -> Option<T> {
        let fetch_id = Uuid::new_v4();
        info!(key, %fetch_id, "force refresh requested");

        let previous = match self.memory.get_stale(key) {
            Some(value) => Some(value),
            None => self.persistent.get_stale::<T>(key).await,
        };

        self.memory.delete(key);
        self.persistent.delete(key).await;

        match self.fetch_with_retry().await {
            Ok(Some(value)) => {
                info!(key, %fetch_id, generation = ?value.generation(), "force refresh succeeded");
                self.store(key, &value).await;
                Some(value)
            }
            Ok(None) => {
                info!(
                    key,
                    %fetch_id,
                    had_previous = previous.is_some(),
                    "force refresh found no upstream data, returning previously cached data"
                );
                previous
            }
            Err(err) => {
                warn!(
                    key,
                    %fetch_id,
                    error = %err,
                    had_previous = previous.is_some(),
                    "force refresh failed, returning previously cached data"
                );
                previous
            }
        }
    }

    /// Combined freshness view of both tiers for `key`.
    pub async fn cache_status(&self, key: &str) -> CacheStatus {
        let memory_has = self.memory.has(key);
        let memory = self.memory.stats();
        let persistent = self.persistent.cache_info(key).await;

        let should_refresh = persistent.expired && !memory_has;
        let data_age = match persistent.age_ms {
            Some(ms) => format!("{} days", (ms + DAY_MS / 2) / DAY_MS),
            None => "unknown".to_string(),
        };

        CacheStatus {
            memory_has,
            memory,
            persistent,
            should_refresh,
            data_age,
        }
    }

    /// Sweep expired entries out of both tiers.
    pub async fn cleanup(&self) -> CleanupReport {
        let memory_removed = self.memory.cleanup();
        let persistent_removed = self.persistent.cleanup().await;
        CleanupReport {
            memory_removed,
            persistent_removed,
        }
    }

    fn fetch_slot(&self, key: &str) -> FetchSlot<T> {
        self.inflight.entry(key.to_string()).or_default().clone()
    }

    async fn fetch_and_store(
        &self,
        key: &str,
        slot: &mut Option<ProviderResult<Option<T>>>,
    ) -> Option<T> {
        let fetch_id = Uuid::new_v4();
        let stale = self.capture_stale(key).await;

        info!(key, %fetch_id, "cache miss, fetching from upstream");
        let outcome = self.fetch_with_retry().await;

        let resolved = match &outcome {
            Ok(Some(value)) => {
                info!(
                    key,
                    %fetch_id,
                    generation = ?value.generation(),
                    "upstream fetch succeeded, writing both tiers"
                );
                self.store(key, value).await;
                Some(value.clone())
            }
            Ok(None) => {
                info!(key, %fetch_id, "upstream had no data");
                None
            }
            Err(err) => {
                warn!(
                    key,
                    %fetch_id,
                    error = %err,
                    kind = ?err.kind(),
                    serving_stale = stale.is_some(),
                    "upstream fetch failed"
                );
                stale
            }
        };

        // Publish once the tiers are written. Tasks already queued on this
        // gate read the recorded outcome; later arrivals start a new fetch.
        *slot = Some(outcome);
        self.inflight.remove(key);
        resolved
    }

    /// Apply the fallback policy to a fetch outcome recorded by another
    /// task. Successful fetches were already written to both tiers by the
    /// task that performed them.
    async fn resolve_shared(&self, key: &str, outcome: ProviderResult<Option<T>>) -> Option<T> {
        match outcome {
            Ok(value) => value,
            Err(err) => {
                let stale = self.capture_stale(key).await;
                warn!(
                    key,
                    error = %err,
                    serving_stale = stale.is_some(),
                    "in-flight upstream fetch had failed"
                );
                stale
            }
        }
    }

    // An expired persistent entry is still a usable fallback when the
    // upstream is down, so look for one before deciding how to answer.
    async fn capture_stale(&self, key: &str) -> Option<T> {
        let info = self.persistent.cache_info(key).await;
        if info.exists && info.expired {
            debug!(key, "expired persistent entry available as fallback");
            self.persistent.get_stale::<T>(key).await
        } else {
            None
        }
    }

    async fn fetch_with_retry(&self) -> ProviderResult<Option<T>> {
        let provider = self.provider.clone();
        with_retry(self.config.retry, move || {
            let provider = provider.clone();
            async move { provider.fetch_latest().await }
        })
        .await
    }

    async fn store(&self, key: &str, value: &T) {
        self.memory.set(key, value.clone(), self.config.memory_ttl);
        self.persistent
            .set(key, value, self.config.persistent_ttl)
            .await;
    }
}

/// Periodically sweep expired entries from both tiers.
pub fn spawn_cleanup_task<T: Cacheable>(
    orchestrator: Arc<CacheOrchestrator<T>>,
    every: Duration,
) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "starting cache cleanup task");
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            let report = orchestrator.cleanup().await;
            if report.memory_removed > 0 || report.persistent_removed > 0 {
                info!(
                    memory_removed = report.memory_removed,
                    persistent_removed = report.persistent_removed,
                    "cleanup pass removed expired entries"
                );
            }
        }
    })
}

// ============================================================================
// TESTS
// ============================================================================

//! Holdfast Core - Shared Types
//!
//! Foundation types for the caching pipeline: the error taxonomy, cache
//! entry shapes, the retry policy, the holdings domain model, and the
//! upstream provider abstraction. The cache and client crates both build
//! on this crate.

pub mod config;
pub mod entry;
pub mod error;
pub mod holdings;
pub mod provider;
pub mod retry;

pub use config::{ApiSecret, CacheSettings, ProviderConfig, DEFAULT_API_URL};
pub use entry::{CacheEntry, Cacheable, PersistedEntry};
pub use error::{ErrorKind, ProviderError, ProviderResult};
pub use holdings::{current_quarter, quarter_label, HoldingsSnapshot, Position, PositionChange};
pub use provider::UpstreamProvider;
pub use retry::{with_retry, RetryPolicy};

//! Upstream data source abstraction.

use async_trait::async_trait;

use crate::error::ProviderResult;

/// A slow, failure-prone source of truth for cacheable values.
///
/// `Ok(None)` means the upstream answered but had nothing to return, which
/// callers treat as a miss rather than an error. All failures arrive as
/// classified [`ProviderError`](crate::error::ProviderError)s so the caller
/// can tell retryable conditions from permanent ones.
#[async_trait]
pub trait UpstreamProvider<T>: Send + Sync {
    async fn fetch_latest(&self) -> ProviderResult<Option<T>>;
}

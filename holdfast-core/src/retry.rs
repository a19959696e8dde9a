//! Bounded retry with exponential backoff for upstream fetches.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::ProviderResult;

/// Retry budget for a fetch operation.
///
/// `max_retries` counts retries after the initial attempt, so a policy with
/// `max_retries = 3` makes at most four attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Backoff before the retry that follows failed attempt `attempt`
    /// (zero-based): `base_delay * 2^attempt`, saturating on overflow.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// exhausts the retry budget.
///
/// Non-retryable errors propagate immediately without sleeping. When a rate
/// limit error carries a server-provided backoff, that hint replaces the
/// exponential delay for the attempt it accompanies.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = err
                    .retry_after()
                    .unwrap_or_else(|| policy.delay_for(attempt));
                warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retryable upstream error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Client-side rate limiting.
//!
//! The upstream allows a fixed number of requests per rolling window and
//! dislikes bursts, so the limiter enforces both a window quota and a
//! minimum gap between consecutive requests. State lives inside one limiter
//! owned by one client; nothing here is global.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info};

use holdfast_core::ProviderConfig;

#[derive(Debug)]
struct RateWindow {
    window_start: Instant,
    request_count: u32,
    last_request: Option<Instant>,
}

/// Window quota plus request spacing.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    min_spacing: Duration,
    state: Mutex<RateWindow>,
}

impl RateLimiter {
    /// Build a limiter allowing `limit` requests per `window`, at least
    /// `min_spacing` apart. A zero limit is clamped to one so the limiter
    /// can never deadlock its caller.
    pub fn new(limit: u32, window: Duration, min_spacing: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            min_spacing,
            state: Mutex::new(RateWindow {
                window_start: Instant::now(),
                request_count: 0,
                last_request: None,
            }),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            config.rate_limit,
            config.rate_window,
            config.min_request_spacing,
        )
    }

    /// Wait until a request may be sent, then record it.
    ///
    /// The state lock is held across the waits, so concurrent callers queue
    /// up and each slot is handed out exactly once.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        if now.duration_since(state.window_start) >= self.window {
            state.window_start = now;
            state.request_count = 0;
        }

        if state.request_count >= self.limit {
            let wait = self.window.saturating_sub(state.window_start.elapsed());
            if !wait.is_zero() {
                info!(
                    wait_ms = wait.as_millis() as u64,
                    limit = self.limit,
                    "rate window exhausted, waiting for reset"
                );
                sleep(wait).await;
            }
            state.window_start = Instant::now();
            state.request_count = 0;
        }

        if let Some(last) = state.last_request {
            // Measured fresh after any window wait above.
            let since_last = last.elapsed();
            if since_last < self.min_spacing {
                let wait = self.min_spacing - since_last;
                debug!(wait_ms = wait.as_millis() as u64, "spacing out request");
                sleep(wait).await;
            }
        }

        state.request_count += 1;
        state.last_request = Some(Instant::now());
    }
}

// ============================================================================
// TESTS
// ============================================================================

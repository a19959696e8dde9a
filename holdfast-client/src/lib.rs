//! Holdfast Client - Signed API Access
//!
//! HTTP client for the quarterly holdings API: HMAC request signing,
//! client-side rate limiting, response classification into the shared error
//! taxonomy, and the holdings provider that plugs into the cache
//! orchestrator.

pub mod client;
pub mod commands;
pub mod provider;
pub mod rate_limit;
pub mod signing;

pub use client::SignedApiClient;
pub use commands::ApiCommand;
pub use provider::{HoldingsApiProvider, DEFAULT_POSITION_LIMIT};
pub use rate_limit::RateLimiter;
pub use signing::sign_payload;

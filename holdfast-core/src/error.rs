//! Error taxonomy for upstream provider failures.
//!
//! Every failure that crosses the provider boundary is classified into one of
//! four kinds so callers can decide between retrying, falling back to stale
//! data, and giving up. Transport-level failures (connect errors, timeouts)
//! are folded into [`ProviderError::Api`] with no status code.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// PROVIDER ERRORS
// ============================================================================

/// Classified upstream failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Credentials missing locally or rejected by the upstream API.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Upstream rate limit tripped. `retry_after_ms` carries the server's
    /// requested backoff when it sent one.
    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after_ms: Option<u64>,
    },

    /// The requested resource does not exist upstream.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Any other API failure. `status` is `None` for transport-level errors
    /// that never produced an HTTP response.
    #[error("API error{}: {message}", status_suffix(.status))]
    Api {
        message: String,
        status: Option<u16>,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

/// Discriminant-only view of [`ProviderError`], for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    RateLimit,
    NotFound,
    Api,
}

impl ProviderError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after_ms,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Api {
            message: message.into(),
            status,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Api { .. } => ErrorKind::Api,
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Rate limits clear on their own, and server-side errors (5xx) or
    /// transport failures with no status are often transient. Authentication
    /// failures, missing resources, and client-side 4xx errors are permanent
    /// until something outside the retry loop changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Api { status, .. } => match status {
                Some(code) => *code >= 500,
                None => true,
            },
            Self::Authentication { .. } | Self::NotFound { .. } => false,
        }
    }

    /// Server-requested backoff, if the upstream sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit {
                retry_after_ms: Some(ms),
                ..
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }

    /// HTTP status attached to the failure, when one exists.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result alias used across the provider and cache crates.
pub type ProviderResult<T> = Result<T, ProviderError>;

// ============================================================================
// TESTS
// ============================================================================

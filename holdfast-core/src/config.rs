//! Configuration for the upstream provider and the cache tiers.
//!
//! Configuration is loaded from environment variables with defaults that
//! work out of the box for development. Credentials are intentionally NOT
//! validated at load time; the client checks them when a request is first
//! attempted, so cache-only workflows run without any credentials set.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default endpoint for the holdings API.
pub const DEFAULT_API_URL: &str = "https://whalewisdom.com/shell/command";

// ============================================================================
// SECRET HANDLING
// ============================================================================

/// HMAC signing secret, wrapped so debug output and logs never leak it.
#[derive(Clone)]
pub struct ApiSecret(SecretString);

impl Default for ApiSecret {
    fn default() -> Self {
        Self::new("")
    }
}

impl ApiSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(SecretString::from(secret.into()))
    }

    /// Access the raw secret for signing. Callers must not log the result.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl fmt::Debug for ApiSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiSecret([REDACTED])")
    }
}

// ============================================================================
// PROVIDER CONFIGURATION
// ============================================================================

/// Settings for the signed upstream API client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Endpoint that receives signed command payloads.
    pub api_url: String,

    /// Public half of the credential pair, sent as a request header.
    pub access_key: String,

    /// Secret half of the credential pair, used only for signing.
    pub secret_key: ApiSecret,

    /// Requests allowed per rate window.
    pub rate_limit: u32,

    /// Length of the client-side rate window.
    pub rate_window: Duration,

    /// Minimum spacing between consecutive requests.
    pub min_request_spacing: Duration,

    /// Per-request timeout, independent of rate limiter waits.
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            access_key: String::new(),
            secret_key: ApiSecret::default(),
            rate_limit: 20,                              // 20 requests
            rate_window: Duration::from_millis(60_000),  // per minute
            min_request_spacing: Duration::from_millis(3_000),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ProviderConfig {
    /// Create ProviderConfig from environment variables.
    ///
    /// Environment variables:
    /// - `HOLDFAST_API_URL`: Command endpoint (default: whalewisdom shell endpoint)
    /// - `HOLDFAST_ACCESS_KEY`: Public API key (default: empty)
    /// - `HOLDFAST_SECRET_KEY`: Signing secret (default: empty)
    /// - `HOLDFAST_RATE_LIMIT`: Requests per window (default: 20)
    /// - `HOLDFAST_RATE_WINDOW_MS`: Window length in ms (default: 60000)
    /// - `HOLDFAST_MIN_SPACING_MS`: Gap between requests in ms (default: 3000)
    /// - `HOLDFAST_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("HOLDFAST_API_URL").unwrap_or(defaults.api_url);

        let access_key = std::env::var("HOLDFAST_ACCESS_KEY").unwrap_or_default();

        let secret_key = ApiSecret::new(std::env::var("HOLDFAST_SECRET_KEY").unwrap_or_default());

        let rate_limit = std::env::var("HOLDFAST_RATE_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.rate_limit);

        let rate_window = std::env::var("HOLDFAST_RATE_WINDOW_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.rate_window);

        let min_request_spacing = std::env::var("HOLDFAST_MIN_SPACING_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.min_request_spacing);

        let request_timeout = std::env::var("HOLDFAST_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Self {
            api_url,
            access_key,
            secret_key,
            rate_limit,
            rate_window,
            min_request_spacing,
            request_timeout,
        }
    }

    /// Both halves of the credential pair are present.
    pub fn has_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = access_key.into();
        self.secret_key = ApiSecret::new(secret_key);
        self
    }

    pub fn with_rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.rate_limit = limit;
        self.rate_window = window;
        self
    }

    pub fn with_min_request_spacing(mut self, spacing: Duration) -> Self {
        self.min_request_spacing = spacing;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ============================================================================
// CACHE SETTINGS
// ============================================================================

/// Settings for the two cache tiers.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Directory for persistent cache files.
    pub cache_dir: PathBuf,

    /// Freshness window for the memory tier.
    pub memory_ttl: Duration,

    /// Freshness window for the persistent tier. Longer than the memory TTL
    /// so expired-but-present data survives for stale fallback.
    pub persistent_ttl: Duration,
}

const DAY: u64 = 24 * 60 * 60;

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".holdfast-cache"),
            memory_ttl: Duration::from_secs(30 * DAY),     // quarterly data
            persistent_ttl: Duration::from_secs(90 * DAY), // one full quarter
        }
    }
}

impl CacheSettings {
    /// Create CacheSettings from environment variables.
    ///
    /// Environment variables:
    /// - `HOLDFAST_CACHE_DIR`: Persistent cache directory (default: .holdfast-cache)
    /// - `HOLDFAST_MEMORY_TTL_SECS`: Memory tier TTL (default: 30 days)
    /// - `HOLDFAST_PERSISTENT_TTL_SECS`: Persistent tier TTL (default: 90 days)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_dir = std::env::var("HOLDFAST_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let memory_ttl = std::env::var("HOLDFAST_MEMORY_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.memory_ttl);

        let persistent_ttl = std::env::var("HOLDFAST_PERSISTENT_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.persistent_ttl);

        Self {
            cache_dir,
            memory_ttl,
            persistent_ttl,
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = ttl;
        self
    }

    pub fn with_persistent_ttl(mut self, ttl: Duration) -> Self {
        self.persistent_ttl = ttl;
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Restores an environment variable to its previous state on drop.
    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_default_provider_config() {
        let config = ProviderConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.rate_limit, 20);
        assert_eq!(config.rate_window, Duration::from_millis(60_000));
        assert_eq!(config.min_request_spacing, Duration::from_millis(3_000));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_default_cache_settings() {
        let settings = CacheSettings::default();
        assert_eq!(settings.cache_dir, PathBuf::from(".holdfast-cache"));
        assert_eq!(settings.memory_ttl, Duration::from_secs(30 * DAY));
        assert_eq!(settings.persistent_ttl, Duration::from_secs(90 * DAY));
    }

    #[test]
    fn test_credentials_require_both_halves() {
        let config = ProviderConfig::default().with_credentials("access", "");
        assert!(!config.has_credentials());

        let config = ProviderConfig::default().with_credentials("", "secret");
        assert!(!config.has_credentials());

        let config = ProviderConfig::default().with_credentials("access", "secret");
        assert!(config.has_credentials());
    }

    #[test]
    fn test_from_env_reads_overrides() {
        let _url = EnvVarGuard::set("HOLDFAST_API_URL", "https://example.test/api");
        let _limit = EnvVarGuard::set("HOLDFAST_RATE_LIMIT", "5");

        let config = ProviderConfig::from_env();
        assert_eq!(config.api_url, "https://example.test/api");
        assert_eq!(config.rate_limit, 5);
    }

    #[test]
    fn test_from_env_ignores_unparseable_values() {
        let _window = EnvVarGuard::set("HOLDFAST_RATE_WINDOW_MS", "not-a-number");

        let config = ProviderConfig::from_env();
        assert_eq!(config.rate_window, Duration::from_millis(60_000));
    }

    #[test]
    fn test_cache_settings_from_env() {
        let _dir = EnvVarGuard::set("HOLDFAST_CACHE_DIR", "/tmp/holdfast-test");
        let _ttl = EnvVarGuard::set("HOLDFAST_MEMORY_TTL_SECS", "120");

        let settings = CacheSettings::from_env();
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/holdfast-test"));
        assert_eq!(settings.memory_ttl, Duration::from_secs(120));
    }

    #[test]
    fn test_api_secret_debug_is_redacted() {
        let secret = ApiSecret::new("super-secret-value");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_api_secret_empty_check() {
        assert!(ApiSecret::new("").is_empty());
        assert!(ApiSecret::default().is_empty());
        assert!(!ApiSecret::new("k").is_empty());
    }
}

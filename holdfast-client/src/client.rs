//! Signed HTTP client for the holdings API.
//!
//! Wraps a reqwest client with credential checks, rate limiting, request
//! signing, and response classification. Credentials are verified when a
//! request is attempted, not at construction, so the client can be built in
//! environments that only ever read from cache.

use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use holdfast_core::{ProviderConfig, ProviderError, ProviderResult};

use crate::rate_limit::RateLimiter;
use crate::signing::sign_payload;

const ACCESS_KEY_HEADER: &str = "X-Access-Key";
const SIGNATURE_HEADER: &str = "X-Signature";

/// Rate-limited client that signs every command it sends.
#[derive(Debug)]
pub struct SignedApiClient {
    http: reqwest::Client,
    config: ProviderConfig,
    limiter: RateLimiter,
}

impl SignedApiClient {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::api(format!("failed to build HTTP client: {e}"), None))?;
        let limiter = RateLimiter::from_config(&config);
        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Send one signed command and return its decoded JSON body.
    ///
    /// Waits on the rate limiter before sending. The request timeout starts
    /// when the request goes on the wire, so limiter waits can never trip
    /// it.
    pub async fn execute<C: Serialize>(&self, command: &C) -> ProviderResult<Value> {
        if !self.config.has_credentials() {
            return Err(ProviderError::authentication(
                "API credentials not configured",
            ));
        }

        self.limiter.acquire().await;

        // Serialize once; the signature must cover the exact bytes sent.
        let payload = serde_json::to_vec(command)
            .map_err(|e| ProviderError::api(format!("failed to encode command: {e}"), None))?;
        let signature = sign_payload(&payload, self.config.secret_key.expose())?;

        debug!(
            url = %self.config.api_url,
            bytes = payload.len(),
            "sending signed command"
        );

        let response = self
            .http
            .post(&self.config.api_url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCESS_KEY_HEADER, &self.config.access_key)
            .header(SIGNATURE_HEADER, signature)
            .body(payload)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        let retry_after_ms = parse_retry_after(response.headers());
        let body = response.text().await.map_err(classify_transport)?;

        classify_response(status, retry_after_ms, &body)
    }
}

fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::api("request timed out", None)
    } else {
        ProviderError::api(format!("transport error: {err}"), None)
    }
}

/// `Retry-After` header in milliseconds. Only the delta-seconds form is
/// honored; HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
}

/// Map one HTTP exchange onto the error taxonomy.
///
/// Success requires a 2xx status AND a decodable JSON body with no `error`
/// field. An upstream that reports an application error inside a 2xx body
/// gets that 2xx status attached, which keeps it non-retryable.
fn classify_response(
    status: u16,
    retry_after_ms: Option<u64>,
    body: &str,
) -> ProviderResult<Value> {
    match status {
        429 => Err(ProviderError::rate_limit(
            "upstream rate limit exceeded",
            retry_after_ms,
        )),
        401 | 403 => Err(ProviderError::authentication(
            "credentials rejected by upstream",
        )),
        404 => Err(ProviderError::not_found("resource not found upstream")),
        s if !(200..300).contains(&s) => {
            Err(ProviderError::api("API request failed", Some(s)))
        }
        s => {
            let value: Value = serde_json::from_str(body)
                .map_err(|_| ProviderError::api("malformed JSON in response body", None))?;
            if value.is_null() {
                return Err(ProviderError::api("empty response body", Some(s)));
            }
            match value.get("error") {
                Some(error) if !error.is_null() => {
                    Err(ProviderError::api(error_text(error), Some(s)))
                }
                _ => Ok(value),
            }
        }
    }
}

fn error_text(error: &Value) -> String {
    match error.as_str() {
        Some(text) => format!("upstream error: {text}"),
        None => format!("upstream error: {error}"),
    }
}

// ============================================================================
// TESTS
// ============================================================================

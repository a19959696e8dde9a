//! Holdings provider backed by the signed API client.
//!
//! Resolves a filer name to its numeric id once, then fetches and shapes
//! that filer's latest disclosed holdings. Upstream payloads are messy:
//! numbers arrive as strings, fields go missing, ranks are sometimes absent.
//! Shaping is deliberately lenient and defaults instead of failing.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::info;

use holdfast_core::{
    current_quarter, HoldingsSnapshot, Position, PositionChange, ProviderError, ProviderResult,
    UpstreamProvider,
};

use crate::client::SignedApiClient;
use crate::commands::ApiCommand;

/// Positions requested per holdings fetch.
pub const DEFAULT_POSITION_LIMIT: u32 = 50;

/// Fetches one filer's quarterly holdings.
#[derive(Debug)]
pub struct HoldingsApiProvider {
    client: SignedApiClient,
    filer_name: String,
    position_limit: u32,
    filer_id: OnceCell<u64>,
}

impl HoldingsApiProvider {
    pub fn new(client: SignedApiClient, filer_name: impl Into<String>) -> Self {
        Self {
            client,
            filer_name: filer_name.into(),
            position_limit: DEFAULT_POSITION_LIMIT,
            filer_id: OnceCell::new(),
        }
    }

    pub fn with_position_limit(mut self, limit: u32) -> Self {
        self.position_limit = limit;
        self
    }

    /// Skip the lookup round-trip when the filer id is already known.
    pub fn with_filer_id(self, filer_id: u64) -> Self {
        Self {
            filer_id: OnceCell::new_with(Some(filer_id)),
            ..self
        }
    }

    pub fn filer_name(&self) -> &str {
        &self.filer_name
    }

    /// Quarter-over-quarter comparison, returned as the raw upstream body.
    pub async fn fetch_comparison(&self, quarters: Vec<String>) -> ProviderResult<Value> {
        let filer_id = self.resolve_filer_id().await?;
        self.client
            .execute(&ApiCommand::holdings_comparison(filer_id, quarters))
            .await
    }

    /// Resolve the filer id, looking it up on first use and caching it for
    /// the provider's lifetime.
    async fn resolve_filer_id(&self) -> ProviderResult<u64> {
        self.filer_id
            .get_or_try_init(|| self.lookup_filer_id())
            .await
            .copied()
    }

    async fn lookup_filer_id(&self) -> ProviderResult<u64> {
        info!(filer = %self.filer_name, "looking up filer id");
        let response = self
            .client
            .execute(&ApiCommand::filer_lookup(self.filer_name.as_str()))
            .await?;

        let filers: Vec<FilerRecord> = match response.get("filers") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ProviderError::api(format!("malformed filer list: {e}"), None))?,
            None => Vec::new(),
        };

        match match_filer(&filers, &self.filer_name) {
            Some(filer) => {
                info!(filer = %filer.name, filer_id = filer.id, "resolved filer id");
                Ok(filer.id)
            }
            None => Err(ProviderError::not_found(format!(
                "no filer matching '{}'",
                self.filer_name
            ))),
        }
    }

    fn shape_snapshot(&self, filer_id: u64, response: Value) -> ProviderResult<HoldingsSnapshot> {
        let wire: WireHoldingsResponse = serde_json::from_value(response)
            .map_err(|e| ProviderError::api(format!("malformed holdings response: {e}"), None))?;

        let positions: Vec<Position> = wire.holdings.into_iter().map(shape_position).collect();

        let quarter = wire
            .quarter
            .filter(|q| !q.is_empty())
            .unwrap_or_else(current_quarter);
        let report_date = wire
            .report_date
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

        Ok(HoldingsSnapshot::new(
            self.filer_name.as_str(),
            filer_id,
            quarter,
            report_date,
            positions,
        ))
    }
}

#[async_trait]
impl UpstreamProvider<HoldingsSnapshot> for HoldingsApiProvider {
    async fn fetch_latest(&self) -> ProviderResult<Option<HoldingsSnapshot>> {
        let filer_id = self.resolve_filer_id().await?;
        let response = self
            .client
            .execute(&ApiCommand::holdings(filer_id, Some(self.position_limit)))
            .await?;
        let snapshot = self.shape_snapshot(filer_id, response)?;
        info!(
            filer_id,
            quarter = %snapshot.quarter,
            positions = snapshot.total_positions,
            "fetched holdings snapshot"
        );
        Ok(Some(snapshot))
    }
}

// ============================================================================
// WIRE SHAPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct FilerRecord {
    id: u64,
    name: String,
}

/// Case-insensitive substring match over the lookup results.
fn match_filer<'a>(filers: &'a [FilerRecord], name: &str) -> Option<&'a FilerRecord> {
    let needle = name.to_lowercase();
    filers
        .iter()
        .find(|filer| filer.name.to_lowercase().contains(&needle))
}

#[derive(Debug, Deserialize)]
struct WireHoldingsResponse {
    #[serde(default)]
    holdings: Vec<WireHolding>,
    #[serde(default)]
    quarter: Option<String>,
    #[serde(default)]
    report_date: Option<String>,
}

/// Numeric fields are kept as raw JSON because the upstream sends them as
/// either numbers or strings depending on the endpoint's mood.
#[derive(Debug, Deserialize)]
struct WireHolding {
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    security_type: Option<String>,
    #[serde(default)]
    shares: Value,
    #[serde(default)]
    market_value: Value,
    #[serde(default)]
    portfolio_percent: Value,
    #[serde(default)]
    rank: Value,
    #[serde(default)]
    change: Option<WireChange>,
}

#[derive(Debug, Deserialize)]
struct WireChange {
    #[serde(default)]
    shares: Value,
    #[serde(default)]
    market_value: Value,
    #[serde(rename = "type", default)]
    change_type: Option<String>,
}

fn shape_position(raw: WireHolding) -> Position {
    Position {
        ticker: raw.ticker,
        name: raw.name,
        security_type: raw
            .security_type
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Stock".to_string()),
        shares: lenient_u64(&raw.shares),
        market_value: lenient_f64(&raw.market_value),
        portfolio_percent: lenient_f64(&raw.portfolio_percent),
        rank: lenient_u64(&raw.rank) as u32,
        change: raw.change.map(|change| PositionChange {
            shares: lenient_i64(&change.shares),
            market_value: lenient_f64(&change.market_value),
            change_type: change
                .change_type
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "unchanged".to_string()),
        }),
    }
}

fn lenient_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn lenient_u64(value: &Value) -> u64 {
    let parsed = lenient_f64(value);
    if parsed.is_finite() && parsed > 0.0 {
        parsed as u64
    } else {
        0
    }
}

fn lenient_i64(value: &Value) -> i64 {
    let parsed = lenient_f64(value);
    if parsed.is_finite() {
        parsed as i64
    } else {
        0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use holdfast_core::ProviderConfig;
    use serde_json::json;

    fn make_test_provider() -> HoldingsApiProvider {
        let config = ProviderConfig::default().with_credentials("access", "secret");
        let client = SignedApiClient::new(config).expect("client should build");
        HoldingsApiProvider::new(client, "Scion Asset Management").with_filer_id(3507)
    }

    #[test]
    fn test_match_filer_is_case_insensitive_substring() {
        let filers = vec![
            FilerRecord {
                id: 1,
                name: "Bridgewater Associates".to_string(),
            },
            FilerRecord {
                id: 2,
                name: "SCION ASSET MANAGEMENT, LLC".to_string(),
            },
        ];

        let matched = match_filer(&filers, "Scion Asset Management");
        assert_eq!(matched.map(|f| f.id), Some(2));

        assert!(match_filer(&filers, "Berkshire").is_none());
    }

    #[test]
    fn test_shape_snapshot_full_payload() {
        let provider = make_test_provider();
        let response = json!({
            "quarter": "Q1 2025",
            "report_date": "2025-02-14",
            "holdings": [
                {
                    "ticker": "EL",
                    "name": "Estee Lauder",
                    "security_type": "Stock",
                    "shares": "150000",
                    "market_value": "9800000.5",
                    "portfolio_percent": "12.5",
                    "rank": 2,
                    "change": {"shares": -50000, "market_value": "-3000000", "type": "reduced"}
                },
                {
                    "ticker": "BABA",
                    "name": "Alibaba",
                    "shares": 300000,
                    "market_value": 24000000.0,
                    "portfolio_percent": 31.0,
                    "rank": 1
                }
            ]
        });

        let snapshot = provider
            .shape_snapshot(3507, response)
            .expect("shaping should succeed");

        assert_eq!(snapshot.filer_id, 3507);
        assert_eq!(snapshot.quarter, "Q1 2025");
        assert_eq!(snapshot.report_date, "2025-02-14");
        assert_eq!(snapshot.total_positions, 2);
        assert_eq!(snapshot.total_value, 33_800_000.5);

        // Largest weight first.
        assert_eq!(snapshot.positions[0].ticker, "BABA");
        assert_eq!(snapshot.positions[0].shares, 300_000);

        let el = &snapshot.positions[1];
        assert_eq!(el.shares, 150_000);
        assert_eq!(el.market_value, 9_800_000.5);
        assert_eq!(el.rank, 2);
        let change = el.change.as_ref().expect("change should exist");
        assert_eq!(change.shares, -50_000);
        assert_eq!(change.market_value, -3_000_000.0);
        assert_eq!(change.change_type, "reduced");
    }

    #[test]
    fn test_shape_snapshot_defaults_for_sparse_payload() {
        let provider = make_test_provider();
        let response = json!({
            "holdings": [
                {"ticker": "GEO", "portfolio_percent": "not-a-number"}
            ]
        });

        let snapshot = provider
            .shape_snapshot(3507, response)
            .expect("shaping should succeed");

        let position = &snapshot.positions[0];
        assert_eq!(position.security_type, "Stock");
        assert_eq!(position.shares, 0);
        assert_eq!(position.market_value, 0.0);
        assert_eq!(position.portfolio_percent, 0.0);
        // Unranked position picks up its sort position.
        assert_eq!(position.rank, 1);
        assert!(position.change.is_none());

        // Missing quarter falls back to the current calendar quarter.
        assert!(snapshot.quarter.starts_with('Q'));
        assert!(!snapshot.report_date.is_empty());
    }

    #[test]
    fn test_shape_snapshot_empty_holdings() {
        let provider = make_test_provider();
        let snapshot = provider
            .shape_snapshot(3507, json!({"quarter": "Q2 2025"}))
            .expect("shaping should succeed");

        assert_eq!(snapshot.total_positions, 0);
        assert_eq!(snapshot.total_value, 0.0);
    }

    #[test]
    fn test_shape_snapshot_rejects_non_object_response() {
        let provider = make_test_provider();
        let err = provider
            .shape_snapshot(3507, json!([1, 2, 3]))
            .expect_err("array body should fail");
        assert!(format!("{err}").contains("malformed holdings response"));
    }

    #[test]
    fn test_change_type_defaults_to_unchanged() {
        let provider = make_test_provider();
        let response = json!({
            "holdings": [
                {"ticker": "X", "change": {"shares": 100, "market_value": 5}}
            ]
        });

        let snapshot = provider
            .shape_snapshot(3507, response)
            .expect("shaping should succeed");
        let change = snapshot.positions[0].change.as_ref().expect("change");
        assert_eq!(change.change_type, "unchanged");
    }

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(lenient_u64(&json!("150000")), 150_000);
        assert_eq!(lenient_u64(&json!(150000)), 150_000);
        assert_eq!(lenient_u64(&json!("  42 ")), 42);
        assert_eq!(lenient_u64(&json!(null)), 0);
        assert_eq!(lenient_u64(&json!("junk")), 0);
        assert_eq!(lenient_u64(&json!(-5)), 0);

        assert_eq!(lenient_f64(&json!("12.5")), 12.5);
        assert_eq!(lenient_f64(&json!(12.5)), 12.5);
        assert_eq!(lenient_f64(&json!({})), 0.0);

        assert_eq!(lenient_i64(&json!("-50000")), -50_000);
        assert_eq!(lenient_i64(&json!(-50000)), -50_000);
        assert_eq!(lenient_i64(&json!(null)), 0);
    }
}

//! Quarterly holdings snapshot model.
//!
//! Institutional filers disclose their positions once per quarter, so a
//! snapshot is labeled with the quarter it reports on and changes only when
//! a new filing lands.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::entry::Cacheable;

/// Quarter-over-quarter movement for a single position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionChange {
    pub shares: i64,
    pub market_value: f64,
    pub change_type: String,
}

/// A single disclosed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub ticker: String,
    pub name: String,
    pub security_type: String,
    pub shares: u64,
    pub market_value: f64,
    pub portfolio_percent: f64,
    pub rank: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<PositionChange>,
}

/// A filer's complete disclosed portfolio for one quarter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsSnapshot {
    pub filer_name: String,
    pub filer_id: u64,
    pub quarter: String,
    pub report_date: String,
    pub total_value: f64,
    pub total_positions: usize,
    pub positions: Vec<Position>,
    pub last_updated: DateTime<Utc>,
}

impl HoldingsSnapshot {
    /// Assemble a snapshot from raw positions.
    ///
    /// Positions are ordered by descending portfolio weight. Positions the
    /// upstream did not rank (rank 0) get their rank assigned from that
    /// ordering. `total_value` is the sum of position market values.
    pub fn new(
        filer_name: impl Into<String>,
        filer_id: u64,
        quarter: impl Into<String>,
        report_date: impl Into<String>,
        mut positions: Vec<Position>,
    ) -> Self {
        positions.sort_by(|a, b| {
            b.portfolio_percent
                .partial_cmp(&a.portfolio_percent)
                .unwrap_or(Ordering::Equal)
        });
        for (idx, position) in positions.iter_mut().enumerate() {
            if position.rank == 0 {
                position.rank = idx as u32 + 1;
            }
        }
        let total_value = positions.iter().map(|p| p.market_value).sum();
        Self {
            filer_name: filer_name.into(),
            filer_id,
            quarter: quarter.into(),
            report_date: report_date.into(),
            total_value,
            total_positions: positions.len(),
            positions,
            last_updated: Utc::now(),
        }
    }

    /// Position with the largest portfolio weight, if any.
    pub fn top_position(&self) -> Option<&Position> {
        self.positions.first()
    }
}

impl Cacheable for HoldingsSnapshot {
    fn generation(&self) -> Option<String> {
        Some(self.quarter.clone())
    }
}

/// Label for the calendar quarter containing `date`, e.g. `"Q2 2025"`.
pub fn quarter_label(date: DateTime<Utc>) -> String {
    let quarter = (date.month() - 1) / 3 + 1;
    format!("Q{} {}", quarter, date.year())
}

/// Label for the quarter containing the current date.
pub fn current_quarter() -> String {
    quarter_label(Utc::now())
}

// ============================================================================
// TESTS
// ============================================================================

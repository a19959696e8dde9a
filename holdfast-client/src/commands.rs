//! Command payloads for the holdings API.
//!
//! The upstream takes a single POST endpoint with a JSON body whose
//! `command` field selects the operation. The enum tag maps straight onto
//! that wire shape.

use serde::Serialize;

/// Default quarters compared when the caller does not pick any.
const DEFAULT_COMPARISON_QUARTERS: [&str; 2] = ["latest", "previous"];

/// One command body, serialized exactly as the upstream expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ApiCommand {
    /// Resolve filer names to numeric filer ids.
    FilerLookup { name: String },

    /// Latest disclosed holdings for a set of filers.
    Holdings {
        filer_ids: Vec<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
    },

    /// Quarter-over-quarter comparison for one filer.
    HoldingsComparison {
        filer_id: u64,
        quarters: Vec<String>,
    },
}

impl ApiCommand {
    pub fn filer_lookup(name: impl Into<String>) -> Self {
        Self::FilerLookup { name: name.into() }
    }

    pub fn holdings(filer_id: u64, limit: Option<u32>) -> Self {
        Self::Holdings {
            filer_ids: vec![filer_id],
            limit,
        }
    }

    /// Comparison command; an empty `quarters` list selects the latest and
    /// previous quarters.
    pub fn holdings_comparison(filer_id: u64, quarters: Vec<String>) -> Self {
        let quarters = if quarters.is_empty() {
            DEFAULT_COMPARISON_QUARTERS
                .iter()
                .map(|q| q.to_string())
                .collect()
        } else {
            quarters
        };
        Self::HoldingsComparison { filer_id, quarters }
    }
}

// ============================================================================
// TESTS
// ============================================================================

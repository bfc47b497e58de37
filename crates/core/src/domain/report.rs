use anyhow::ensure;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Report kinds produced by the screener besides the per-criterion ones.
pub struct ReportKind;

impl ReportKind {
    pub const POST_ANALYSIS_STAGE2: &'static str = "post_analysis_stage2";
    pub const STAGE2_DIFF: &'static str = "stage2_diff";
    /// STAGE2 names that also pass the quarterly growth check.
    pub const DAILY_SCREEN: &'static str = "daily_screen";
}

/// A named watch-list for one date. Consumers read the most recent row per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistReport {
    pub date: NaiveDate,
    pub kind: String,
    pub tickers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl WatchlistReport {
    /// Trims symbols and drops blanks and repeats, keeping first-seen order.
    pub fn new(
        date: NaiveDate,
        kind: impl Into<String>,
        tickers: impl IntoIterator<Item = String>,
    ) -> anyhow::Result<Self> {
        let kind = kind.into().trim().to_string();
        ensure!(!kind.is_empty(), "report kind must be non-empty");

        let mut seen = HashSet::new();
        let tickers = tickers
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();

        Ok(Self {
            date,
            kind,
            tickers,
            created_at: Utc::now(),
        })
    }

    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({ "tickers": self.tickers })
    }

    pub fn tickers_from_payload(payload: &serde_json::Value) -> Vec<String> {
        // Older rows stored a bare array instead of {"tickers": [...]}.
        let arr = payload.get("tickers").unwrap_or(payload);
        arr.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::{RelativeStrengthRecord, WatchlistReport};

/// How many failures are spelled out in the run log; the rest only count.
pub const LOGGED_FAILURES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickerFailure {
    pub ticker: String,
    pub stage: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub date: NaiveDate,
    pub universe: usize,
    pub fetched: usize,
    pub ranked: usize,
    pub insufficient_history: usize,
    pub missing_bar: usize,
    pub evaluated: usize,
    /// Tickers evaluated on the previous session because the as-of bar was missing.
    pub stale: usize,
    pub failures: Vec<TickerFailure>,
    pub watchlists: BTreeMap<String, usize>,
    pub breadth: Option<f64>,
    pub persisted: bool,
}

impl RunSummary {
    pub fn new(date: NaiveDate, persisted: bool) -> Self {
        Self {
            date,
            universe: 0,
            fetched: 0,
            ranked: 0,
            insufficient_history: 0,
            missing_bar: 0,
            evaluated: 0,
            stale: 0,
            failures: Vec::new(),
            watchlists: BTreeMap::new(),
            breadth: None,
            persisted,
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|err| {
            serde_json::json!({ "error": format!("summary serialize failed: {err}") })
        })
    }

    pub fn log(&self) {
        tracing::info!(
            date = %self.date,
            universe = self.universe,
            fetched = self.fetched,
            ranked = self.ranked,
            insufficient_history = self.insufficient_history,
            missing_bar = self.missing_bar,
            evaluated = self.evaluated,
            stale = self.stale,
            failed = self.failed(),
            watchlists = ?self.watchlists,
            breadth = ?self.breadth,
            persisted = self.persisted,
            "screen run summary"
        );
        for f in self.failures.iter().take(LOGGED_FAILURES) {
            tracing::warn!(
                date = %self.date,
                ticker = %f.ticker,
                stage = f.stage,
                error = %f.error,
                "ticker failed"
            );
        }
        if self.failed() > LOGGED_FAILURES {
            tracing::warn!(
                date = %self.date,
                more = self.failed() - LOGGED_FAILURES,
                "additional ticker failures not logged"
            );
        }
    }
}

/// Everything a screened date produced, persisted or not.
#[derive(Debug, Clone)]
pub struct ScreenResult {
    pub summary: RunSummary,
    pub relative_strength: Vec<RelativeStrengthRecord>,
    pub reports: Vec<WatchlistReport>,
}

impl ScreenResult {
    pub fn report(&self, kind: &str) -> Option<&WatchlistReport> {
        self.reports.iter().find(|r| r.kind == kind)
    }
}

#[derive(Debug, Clone)]
pub enum DateOutcome {
    NotTradingDay(NaiveDate),
    /// Nothing could be ranked; no rows were written.
    Empty(RunSummary),
    Screened(ScreenResult),
    /// The date could not be processed; other dates in a range keep going.
    Failed { date: NaiveDate, error: String },
}

impl DateOutcome {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::NotTradingDay(date) | Self::Failed { date, .. } => *date,
            Self::Empty(summary) => summary.date,
            Self::Screened(result) => result.summary.date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_json_carries_failures() {
        let mut s = RunSummary::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), true);
        s.failures.push(TickerFailure {
            ticker: "BAD".into(),
            stage: "read_price_history",
            error: "boom".into(),
        });
        let v = s.to_json();
        assert_eq!(v["failures"][0]["ticker"], "BAD");
        assert_eq!(v["date"], "2024-01-02");
        assert_eq!(s.failed(), 1);
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Persisted per-ticker, per-day percentile scores. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeStrengthRecord {
    pub ticker: String,
    pub date: NaiveDate,
    /// Composite (3/6/9/12 month weighted) percentile, 0..=100.
    pub rscore: u8,
    pub m1: Option<u8>,
    pub m3: Option<u8>,
    pub m6: Option<u8>,
}

/// The percentiles a ticker carries into criteria evaluation for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsSnapshot {
    pub composite: Option<u8>,
    pub m1: Option<u8>,
    pub m3: Option<u8>,
    pub m6: Option<u8>,
}

impl From<&RelativeStrengthRecord> for RsSnapshot {
    fn from(r: &RelativeStrengthRecord) -> Self {
        Self {
            composite: Some(r.rscore),
            m1: r.m1,
            m3: r.m3,
            m6: r.m6,
        }
    }
}

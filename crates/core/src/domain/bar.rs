use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One end-of-day OHLCV bar.
///
/// `adj_close` accounts for splits and dividends and drives every momentum and moving
/// average computation. Raw `close` is only used for drawdown and dollar-volume checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: i64,
}

/// Bars dated on or before `as_of`. `bars` must be sorted by date ascending.
pub fn history_as_of(bars: &[PriceBar], as_of: NaiveDate) -> &[PriceBar] {
    let end = bars.partition_point(|b| b.date <= as_of);
    &bars[..end]
}

/// Sorts by date and drops duplicate dates, keeping the last bar seen for a date.
pub fn normalize(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by_key(|b| b.date);
    let mut out: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, adj_close: f64) -> PriceBar {
        PriceBar {
            ticker: "TEST".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: adj_close,
            high: adj_close,
            low: adj_close,
            close: adj_close,
            adj_close,
            volume: 1_000,
        }
    }

    #[test]
    fn history_as_of_is_inclusive() {
        let bars = vec![bar(2, 1.0), bar(3, 2.0), bar(5, 3.0)];
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        assert_eq!(history_as_of(&bars, d(3)).len(), 2);
        assert_eq!(history_as_of(&bars, d(4)).len(), 2);
        assert_eq!(history_as_of(&bars, d(1)).len(), 0);
        assert_eq!(history_as_of(&bars, d(31)).len(), 3);
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let bars = normalize(vec![bar(5, 3.0), bar(2, 1.0), bar(5, 4.0)]);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].adj_close, 1.0);
        assert_eq!(bars[1].adj_close, 4.0);
    }
}

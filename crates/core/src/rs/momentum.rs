//! Trailing price ratios at fixed calendar-day horizons.
//!
//! A horizon's base price is the first bar dated on or after `as_of - H` days, so a
//! target that lands on a weekend or holiday picks the next session's price.

use chrono::{Duration, NaiveDate};

use crate::domain::bar::{history_as_of, PriceBar};
use crate::error::ScreenError;

/// Minimum number of bars (on or before the as-of date) needed to score a ticker.
pub const MIN_HISTORY_BARS: usize = 252;

pub const HORIZONS: [i64; 5] = [30, 90, 180, 270, 360];

/// `price(as_of) / price(as_of - H)` per horizon. A `None` horizon had an unusable price.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MomentumRatios {
    pub ratio_30d: Option<f64>,
    pub ratio_90d: Option<f64>,
    pub ratio_180d: Option<f64>,
    pub ratio_270d: Option<f64>,
    pub ratio_360d: Option<f64>,
}

impl MomentumRatios {
    /// `0.4*P3 + 0.2*P6 + 0.2*P9 + 0.2*P12`, only when all four ratios exist.
    pub fn composite(&self) -> Option<f64> {
        let p3 = self.ratio_90d?;
        let p6 = self.ratio_180d?;
        let p9 = self.ratio_270d?;
        let p12 = self.ratio_360d?;
        Some(0.4 * p3 + 0.2 * p6 + 0.2 * p9 + 0.2 * p12)
    }

    pub fn m1(&self) -> Option<f64> {
        self.ratio_30d
    }

    pub fn m3(&self) -> Option<f64> {
        self.ratio_90d
    }

    pub fn m6(&self) -> Option<f64> {
        self.ratio_180d
    }
}

#[derive(Debug, Clone)]
pub struct MomentumScorer {
    min_bars: usize,
}

impl Default for MomentumScorer {
    fn default() -> Self {
        Self {
            min_bars: MIN_HISTORY_BARS,
        }
    }
}

impl MomentumScorer {
    pub fn new(min_bars: usize) -> Self {
        Self { min_bars }
    }

    /// Scores `bars` (sorted ascending) as of `as_of`.
    ///
    /// Returns `InsufficientHistory` below the bar floor and `MissingBar` when nothing is
    /// dated on or before `as_of`; both are skips, not failures.
    pub fn compute_ratios(
        &self,
        ticker: &str,
        bars: &[PriceBar],
        as_of: NaiveDate,
    ) -> Result<MomentumRatios, ScreenError> {
        let history = history_as_of(bars, as_of);
        let Some(latest) = history.last() else {
            return Err(ScreenError::MissingBar {
                ticker: ticker.to_string(),
                as_of,
            });
        };

        if history.len() < self.min_bars {
            return Err(ScreenError::InsufficientHistory {
                ticker: ticker.to_string(),
                as_of,
                bars: history.len(),
                required: self.min_bars,
            });
        }

        let now = latest.adj_close;
        let ratio = |days: i64| -> Option<f64> {
            let target = as_of - Duration::days(days);
            let idx = history.partition_point(|b| b.date < target);
            let base = history.get(idx)?.adj_close;
            usable(now, base).then(|| now / base)
        };

        Ok(MomentumRatios {
            ratio_30d: ratio(HORIZONS[0]),
            ratio_90d: ratio(HORIZONS[1]),
            ratio_180d: ratio(HORIZONS[2]),
            ratio_270d: ratio(HORIZONS[3]),
            ratio_360d: ratio(HORIZONS[4]),
        })
    }
}

fn usable(now: f64, base: f64) -> bool {
    now.is_finite() && base.is_finite() && now > 0.0 && base > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily_bars(start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                ticker: "TEST".to_string(),
                date: start + Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                adj_close: c,
                volume: 1_000,
            })
            .collect()
    }

    #[test]
    fn history_floor_boundary() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let scorer = MomentumScorer::default();

        let bars = daily_bars(start, &vec![10.0; 252]);
        let as_of = bars[251].date;
        assert!(scorer.compute_ratios("TEST", &bars, as_of).is_ok());

        let short = &bars[1..];
        let err = scorer.compute_ratios("TEST", short, as_of).unwrap_err();
        assert!(matches!(
            err,
            ScreenError::InsufficientHistory { bars: 251, .. }
        ));
    }

    #[test]
    fn bars_after_as_of_are_ignored() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let closes: Vec<f64> = (0..400).map(|i| 100.0 + i as f64).collect();
        let bars = daily_bars(start, &closes);
        let as_of = bars[380].date;
        let r = MomentumScorer::default()
            .compute_ratios("TEST", &bars, as_of)
            .unwrap();
        // 30 calendar days back on a daily series is exactly index 350.
        let expected = closes[380] / closes[350];
        assert!((r.ratio_30d.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn gap_forward_fills_to_next_bar() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut bars = daily_bars(start, &vec![50.0; 300]);
        let as_of = bars[299].date;
        // Remove the exact 30-day target so the next session (price 40) is used.
        let target = as_of - Duration::days(30);
        bars.retain(|b| b.date != target);
        for b in bars.iter_mut().filter(|b| b.date == target + Duration::days(1)) {
            b.adj_close = 40.0;
        }
        let r = MomentumScorer::default()
            .compute_ratios("TEST", &bars, as_of)
            .unwrap();
        assert!((r.ratio_30d.unwrap() - 50.0 / 40.0).abs() < 1e-12);
    }

    #[test]
    fn composite_weights() {
        let r = MomentumRatios {
            ratio_30d: Some(1.0),
            ratio_90d: Some(2.0),
            ratio_180d: Some(1.0),
            ratio_270d: Some(1.0),
            ratio_360d: Some(1.0),
        };
        assert!((r.composite().unwrap() - 1.4).abs() < 1e-12);

        let partial = MomentumRatios {
            ratio_360d: None,
            ..r
        };
        assert!(partial.composite().is_none());
        assert_eq!(partial.m1(), Some(1.0));
    }

    #[test]
    fn zero_base_price_invalidates_only_that_horizon() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut bars = daily_bars(start, &vec![20.0; 400]);
        let as_of = bars[399].date;
        let target = as_of - Duration::days(360);
        for b in bars.iter_mut().filter(|b| b.date == target) {
            b.adj_close = 0.0;
        }
        let r = MomentumScorer::default()
            .compute_ratios("TEST", &bars, as_of)
            .unwrap();
        assert!(r.ratio_360d.is_none());
        assert_eq!(r.ratio_90d, Some(1.0));
        assert!(r.composite().is_none());
    }

    #[test]
    fn empty_history_is_missing_bar() {
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = MomentumScorer::default()
            .compute_ratios("TEST", &[], as_of)
            .unwrap_err();
        assert!(matches!(err, ScreenError::MissingBar { .. }));
    }
}

//! Trailing-window statistics evaluated at a single bar.
//!
//! Every function returns `NaN` when the window needs more history than is available, so
//! comparisons against the result fail closed.

use crate::domain::PriceBar;

/// Mean of the `period` values ending at index `end` (inclusive).
pub fn sma_at(values: &[f64], end: usize, period: usize) -> f64 {
    if period == 0 || end >= values.len() || end + 1 < period {
        return f64::NAN;
    }
    let window = &values[end + 1 - period..=end];
    window.iter().sum::<f64>() / period as f64
}

/// Mean of the trailing `period` values.
pub fn sma_last(values: &[f64], period: usize) -> f64 {
    match values.len() {
        0 => f64::NAN,
        n => sma_at(values, n - 1, period),
    }
}

pub fn rolling_min_last(values: &[f64], period: usize) -> f64 {
    trailing(values, period).map_or(f64::NAN, |w| {
        w.iter().copied().fold(f64::INFINITY, f64::min)
    })
}

pub fn rolling_max_last(values: &[f64], period: usize) -> f64 {
    trailing(values, period).map_or(f64::NAN, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

/// Most negative `close / running_max(close) - 1` over the trailing `period` values.
pub fn max_drawdown_last(values: &[f64], period: usize) -> f64 {
    let Some(window) = trailing(values, period) else {
        return f64::NAN;
    };

    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for &v in window {
        if !v.is_finite() || v <= 0.0 {
            return f64::NAN;
        }
        peak = peak.max(v);
        worst = worst.min(v / peak - 1.0);
    }
    worst
}

/// Average daily range in percent: `mean(high / low - 1) * 100` over the trailing bars.
/// A bar with a non-positive or non-finite low or high makes the whole window `NaN`.
pub fn adr_pct_last(bars: &[PriceBar], period: usize) -> f64 {
    let Some(window) = trailing(bars, period) else {
        return f64::NAN;
    };

    let mut sum = 0.0;
    for b in window {
        if !b.low.is_finite() || b.low <= 0.0 || !b.high.is_finite() {
            return f64::NAN;
        }
        sum += b.high / b.low - 1.0;
    }
    sum / period as f64 * 100.0
}

/// Mean of `volume * close` over the trailing bars.
pub fn dollar_volume_last(bars: &[PriceBar], period: usize) -> f64 {
    let Some(window) = trailing(bars, period) else {
        return f64::NAN;
    };
    let sum: f64 = window.iter().map(|b| b.volume as f64 * b.close).sum();
    sum / period as f64
}

fn trailing<T>(values: &[T], period: usize) -> Option<&[T]> {
    if period == 0 || values.len() < period {
        return None;
    }
    Some(&values[values.len() - period..])
}

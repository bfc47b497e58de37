//! Minervini-style Stage 2 trend template.
//!
//! Twelve sub-conditions evaluated against the latest bar. A rule picks which of them
//! count and how many must hold: the strict preset requires all of them, the relaxed
//! preset takes the classic eight and accepts seven.

use crate::criteria::config::CriteriaConfig;
use crate::criteria::indicators::{
    max_drawdown_last, rolling_max_last, rolling_min_last, sma_at, sma_last,
};
use crate::domain::PriceBar;
use crate::error::ScreenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage2Condition {
    AboveMa150,
    Ma150AboveMa200,
    Ma200Rising,
    Ma50AboveMa150,
    AboveYearLow,
    NearYearHigh,
    RsAboveFloor,
    AboveMa50,
    PriceFloor,
    VolumeFloor,
    NotExtended,
    DrawdownBounded,
}

impl Stage2Condition {
    pub const ALL: [Stage2Condition; 12] = [
        Self::AboveMa150,
        Self::Ma150AboveMa200,
        Self::Ma200Rising,
        Self::Ma50AboveMa150,
        Self::AboveYearLow,
        Self::NearYearHigh,
        Self::RsAboveFloor,
        Self::AboveMa50,
        Self::PriceFloor,
        Self::VolumeFloor,
        Self::NotExtended,
        Self::DrawdownBounded,
    ];

    /// The eight conditions of the classic template.
    pub const CLASSIC: [Stage2Condition; 8] = [
        Self::AboveMa150,
        Self::Ma150AboveMa200,
        Self::Ma200Rising,
        Self::Ma50AboveMa150,
        Self::AboveYearLow,
        Self::NearYearHigh,
        Self::RsAboveFloor,
        Self::AboveMa50,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage2Rule {
    pub conditions: Vec<Stage2Condition>,
    pub min_passed: usize,
    /// Count MA150 > MA200 as met when the composite percentile is below this value.
    pub ma150_waiver_below: Option<u8>,
}

impl Stage2Rule {
    /// Every condition must hold. `extension_guard = false` drops the MA50 extension check.
    pub fn strict(extension_guard: bool) -> Self {
        let conditions: Vec<_> = Stage2Condition::ALL
            .into_iter()
            .filter(|c| extension_guard || *c != Stage2Condition::NotExtended)
            .collect();
        Self {
            min_passed: conditions.len(),
            conditions,
            ma150_waiver_below: None,
        }
    }

    /// At least 7 of the classic 8.
    pub fn relaxed() -> Self {
        Self {
            conditions: Stage2Condition::CLASSIC.to_vec(),
            min_passed: 7,
            ma150_waiver_below: None,
        }
    }

    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.conditions.is_empty() {
            return Err(ScreenError::Configuration(
                "stage2 rule has no conditions".to_string(),
            ));
        }
        if self.min_passed == 0 || self.min_passed > self.conditions.len() {
            return Err(ScreenError::Configuration(format!(
                "stage2 min_passed must be 1..={} (got {})",
                self.conditions.len(),
                self.min_passed
            )));
        }
        Ok(())
    }
}

/// Indicator values at the latest bar. Missing history shows up as `NaN`.
#[derive(Debug, Clone, Copy)]
pub struct TrendSnapshot {
    pub price: f64,
    pub ma50: f64,
    pub ma150: f64,
    pub ma200: f64,
    pub ma200_20_bars_ago: f64,
    pub low_250: f64,
    pub high_250: f64,
    pub avg_volume_20: f64,
    pub drawdown_90: f64,
}

impl TrendSnapshot {
    pub fn compute(bars: &[PriceBar], adj: &[f64]) -> Self {
        let n = adj.len();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

        Self {
            price: adj.last().copied().unwrap_or(f64::NAN),
            ma50: sma_last(adj, 50),
            ma150: sma_last(adj, 150),
            ma200: sma_last(adj, 200),
            ma200_20_bars_ago: n
                .checked_sub(20)
                .map_or(f64::NAN, |end| sma_at(adj, end, 200)),
            low_250: rolling_min_last(adj, 250),
            high_250: rolling_max_last(adj, 250),
            avg_volume_20: sma_last(&volumes, 20),
            drawdown_90: max_drawdown_last(&closes, 90),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stage2Outcome {
    pub checks: Vec<(Stage2Condition, bool)>,
    pub passed_count: usize,
    pub passed: bool,
}

pub fn evaluate(
    rule: &Stage2Rule,
    cfg: &CriteriaConfig,
    snap: &TrendSnapshot,
    composite_rs: Option<u8>,
) -> Stage2Outcome {
    let checks: Vec<(Stage2Condition, bool)> = rule
        .conditions
        .iter()
        .map(|&c| (c, check(c, rule, cfg, snap, composite_rs)))
        .collect();
    let passed_count = checks.iter().filter(|(_, ok)| *ok).count();

    Stage2Outcome {
        passed: passed_count >= rule.min_passed,
        passed_count,
        checks,
    }
}

// NaN on either side of a comparison yields false.
fn check(
    c: Stage2Condition,
    rule: &Stage2Rule,
    cfg: &CriteriaConfig,
    s: &TrendSnapshot,
    composite_rs: Option<u8>,
) -> bool {
    use Stage2Condition::*;

    match c {
        AboveMa150 => s.price > s.ma150,
        Ma150AboveMa200 => {
            let waived = matches!(
                (rule.ma150_waiver_below, composite_rs),
                (Some(cutoff), Some(rs)) if rs < cutoff
            );
            waived || s.ma150 > s.ma200
        }
        Ma200Rising => s.ma200 > s.ma200_20_bars_ago,
        Ma50AboveMa150 => s.ma50 > s.ma150,
        AboveYearLow => s.price > s.low_250 * 1.25,
        NearYearHigh => s.price > s.high_250 * 0.75,
        RsAboveFloor => composite_rs.is_some_and(|rs| rs > cfg.min_rs_percentile),
        AboveMa50 => s.price > s.ma50,
        PriceFloor => s.price >= cfg.min_price,
        VolumeFloor => s.avg_volume_20 >= cfg.min_avg_volume,
        NotExtended => s.price <= s.ma50 * cfg.max_extension_over_ma50,
        DrawdownBounded => s.drawdown_90 >= cfg.max_drawdown,
    }
}

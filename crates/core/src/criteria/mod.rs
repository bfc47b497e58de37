//! Per-ticker boolean checklist.
//!
//! Evaluation is a pure function of the price window, the day's RS snapshot and the
//! selected criteria; nothing is cached between calls.

pub mod config;
pub mod fundamentals;
pub mod indicators;
pub mod stage2;

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::bar::{history_as_of, PriceBar};
use crate::domain::fundamentals::reported_as_of;
use crate::domain::{QuarterlyReport, RsSnapshot};
use crate::error::ScreenError;

pub use config::CriteriaConfig;
use indicators::{adr_pct_last, dollar_volume_last, sma_at, sma_last};
pub use stage2::{Stage2Condition, Stage2Rule, TrendSnapshot};

/// Trading days per month used when sampling MA200 for the Minervini slope checks.
const BARS_PER_MONTH: usize = 21;
const MA200_SAMPLE_STEP: usize = 10;
const VOLUME_WINDOWS: [usize; 3] = [5, 10, 20];
const LOW_VOLATILITY_BARS: usize = 7;
const QULL_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Criterion {
    Stage2,
    Minervini1M,
    Minervini5M,
    SevenDayLowVolatility,
    RecentLowVolume,
    QullM1,
    QullM3,
    QullM6,
    RecentIpo,
    FundamentalGrowth,
}

impl Criterion {
    pub const ALL: [Criterion; 10] = [
        Self::Stage2,
        Self::Minervini1M,
        Self::Minervini5M,
        Self::SevenDayLowVolatility,
        Self::RecentLowVolume,
        Self::QullM1,
        Self::QullM3,
        Self::QullM6,
        Self::RecentIpo,
        Self::FundamentalGrowth,
    ];

    /// Report kind under which the criterion's watch-list is persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stage2 => "stage2",
            Self::Minervini1M => "minervini_1m",
            Self::Minervini5M => "minervini_5m",
            Self::SevenDayLowVolatility => "seven_day_low_volatility",
            Self::RecentLowVolume => "recent_low_volume",
            Self::QullM1 => "qull_m1",
            Self::QullM3 => "qull_m3",
            Self::QullM6 => "qull_m6",
            Self::RecentIpo => "recent_ipo",
            Self::FundamentalGrowth => "fundamental_growth",
        }
    }

    /// Whether the criterion reads quarterly income statements.
    pub fn needs_fundamentals(&self) -> bool {
        matches!(self, Self::FundamentalGrowth)
    }

    /// Parses a comma separated list, e.g. `"stage2, qull_m1"`.
    pub fn parse_list(s: &str) -> Result<Vec<Criterion>, ScreenError> {
        let mut out = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let c = part.parse::<Criterion>()?;
            if !out.contains(&c) {
                out.push(c);
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = ScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| ScreenError::UnknownCriterion(s.trim().to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub results: BTreeMap<Criterion, bool>,
    /// False when the as-of date had no bar and the previous session was used.
    pub as_of_observed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CriteriaEngine {
    config: CriteriaConfig,
}

impl CriteriaEngine {
    pub fn new(config: CriteriaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CriteriaConfig {
        &self.config
    }

    /// Checks the thresholds that would make every evaluation meaningless.
    pub fn validate(&self) -> Result<(), ScreenError> {
        self.config.stage2.validate()?;
        if self.config.recent_volume_days == 0 {
            return Err(ScreenError::Configuration(
                "recent_volume_days must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Evaluates `selected` for one ticker without income statements; growth checks fail.
    pub fn evaluate(
        &self,
        ticker: &str,
        bars: &[PriceBar],
        as_of: NaiveDate,
        rs: &RsSnapshot,
        selected: &[Criterion],
    ) -> Result<Evaluation, ScreenError> {
        self.evaluate_with_fundamentals(ticker, bars, &[], as_of, rs, selected)
    }

    /// Evaluates `selected` for one ticker. `bars` and `quarters` must be sorted ascending;
    /// rows dated after `as_of` are ignored.
    pub fn evaluate_with_fundamentals(
        &self,
        ticker: &str,
        bars: &[PriceBar],
        quarters: &[QuarterlyReport],
        as_of: NaiveDate,
        rs: &RsSnapshot,
        selected: &[Criterion],
    ) -> Result<Evaluation, ScreenError> {
        self.validate()?;

        let history = history_as_of(bars, as_of);
        let Some(latest) = history.last() else {
            return Err(ScreenError::MissingBar {
                ticker: ticker.to_string(),
                as_of,
            });
        };

        let as_of_observed = latest.date == as_of;
        if !as_of_observed {
            tracing::warn!(
                %ticker,
                %as_of,
                last_bar = %latest.date,
                "no bar on as_of date; evaluating on prior session"
            );
        }

        let window = Window::new(history, reported_as_of(quarters, as_of));
        let mut results = BTreeMap::new();
        for &criterion in selected {
            let passed = self.evaluate_one(criterion, ticker, &window, rs);
            results.insert(criterion, passed);
        }

        Ok(Evaluation {
            results,
            as_of_observed,
        })
    }

    fn evaluate_one(
        &self,
        criterion: Criterion,
        ticker: &str,
        w: &Window<'_>,
        rs: &RsSnapshot,
    ) -> bool {
        let cfg = &self.config;
        match criterion {
            Criterion::Stage2 => {
                let snap = TrendSnapshot::compute(w.bars, &w.adj);
                stage2::evaluate(&cfg.stage2, cfg, &snap, rs.composite).passed
            }
            Criterion::Minervini1M => ma200_non_decreasing(&w.adj, 1),
            Criterion::Minervini5M => ma200_non_decreasing(&w.adj, 5),
            Criterion::SevenDayLowVolatility => {
                seven_day_range(&w.adj) <= cfg.low_volatility_threshold
            }
            Criterion::FundamentalGrowth => {
                fundamentals::sales_and_income_growth(w.quarters, cfg.fundamental_min_yoy)
            }
            Criterion::RecentLowVolume => recent_volume_contraction(&w.volume, cfg.recent_volume_days),
            Criterion::QullM1 => self.qull(w, rs.m1),
            Criterion::QullM3 => self.qull(w, rs.m3),
            Criterion::QullM6 => self.qull(w, rs.m6),
            Criterion::RecentIpo => self.recent_ipo(ticker, w),
        }
    }

    fn qull(&self, w: &Window<'_>, percentile: Option<u8>) -> bool {
        let cfg = &self.config;
        let strong = percentile.is_some_and(|p| p > cfg.qull_min_percentile);
        strong
            && adr_pct_last(w.bars, QULL_WINDOW) >= cfg.qull_min_adr_pct
            && dollar_volume_last(w.bars, QULL_WINDOW) >= cfg.qull_min_dollar_volume
    }

    fn recent_ipo(&self, ticker: &str, w: &Window<'_>) -> bool {
        let cfg = &self.config;
        let price = w.adj.last().copied().unwrap_or(f64::NAN);
        ticker.len() < 5
            && w.adj.len() <= cfg.ipo_max_bars
            && price >= cfg.ipo_min_price
            && sma_last(&w.adj, 5) >= sma_last(&w.adj, 20)
    }
}

struct Window<'a> {
    bars: &'a [PriceBar],
    quarters: &'a [QuarterlyReport],
    adj: Vec<f64>,
    volume: Vec<f64>,
}

impl<'a> Window<'a> {
    fn new(bars: &'a [PriceBar], quarters: &'a [QuarterlyReport]) -> Self {
        Self {
            bars,
            quarters,
            adj: bars.iter().map(|b| b.adj_close).collect(),
            volume: bars.iter().map(|b| b.volume as f64).collect(),
        }
    }
}

/// MA200 sampled every 10th bar across the last `months` months never decreases.
fn ma200_non_decreasing(adj: &[f64], months: usize) -> bool {
    let Some(last) = adj.len().checked_sub(1) else {
        return false;
    };
    let span = months * BARS_PER_MONTH;

    // Offsets back from the latest bar, oldest sample first.
    let mut offsets: Vec<usize> = (0..span).step_by(MA200_SAMPLE_STEP).collect();
    offsets.reverse();

    let mut prev = f64::NEG_INFINITY;
    for offset in offsets {
        let Some(end) = last.checked_sub(offset) else {
            return false;
        };
        let ma = sma_at(adj, end, 200);
        if !(ma >= prev) {
            return false;
        }
        prev = ma;
    }
    true
}

fn seven_day_range(adj: &[f64]) -> f64 {
    if adj.len() < LOW_VOLATILITY_BARS {
        return f64::NAN;
    }
    let window = &adj[adj.len() - LOW_VOLATILITY_BARS..];
    let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = window.iter().copied().fold(f64::INFINITY, f64::min);
    if !(min > 0.0) {
        return f64::NAN;
    }
    (max - min) / min
}

fn recent_volume_contraction(volume: &[f64], days: usize) -> bool {
    let recent = sma_last(volume, days);
    VOLUME_WINDOWS
        .iter()
        .all(|&w| recent < sma_last(volume, w))
}

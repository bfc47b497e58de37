use crate::config::env_parse;
use crate::criteria::stage2::Stage2Rule;

/// Thresholds for every criterion. Defaults follow the daily screen; each value can be
/// overridden from the environment.
#[derive(Debug, Clone)]
pub struct CriteriaConfig {
    pub stage2: Stage2Rule,

    /// Composite RS percentile must be strictly above this (`Stage2Condition::RsAboveFloor`).
    pub min_rs_percentile: u8,

    /// Absolute adjusted-close floor (`Stage2Condition::PriceFloor`).
    pub min_price: f64,

    /// Trailing 20-bar mean share volume floor (`Stage2Condition::VolumeFloor`).
    pub min_avg_volume: f64,

    /// Upper bound on `adj_close / MA50` (`Stage2Condition::NotExtended`).
    pub max_extension_over_ma50: f64,

    /// Deepest allowed 90-bar drawdown of raw close (`Stage2Condition::DrawdownBounded`).
    pub max_drawdown: f64,

    /// `(max - min) / min` of the last 7 closes must not exceed this.
    pub low_volatility_threshold: f64,

    /// Bars averaged for the "recent" side of the volume-contraction test.
    pub recent_volume_days: usize,

    pub qull_min_percentile: u8,
    pub qull_min_adr_pct: f64,
    pub qull_min_dollar_volume: f64,

    pub ipo_max_bars: usize,
    pub ipo_min_price: f64,

    /// Latest-quarter sales and net income must both grow by more than this year over year.
    pub fundamental_min_yoy: f64,
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            stage2: Stage2Rule::strict(true),
            min_rs_percentile: 70,
            min_price: 10.0,
            min_avg_volume: 100_000.0,
            max_extension_over_ma50: 1.3,
            max_drawdown: -0.35,
            low_volatility_threshold: 0.12,
            recent_volume_days: 3,
            qull_min_percentile: 90,
            qull_min_adr_pct: 4.0,
            qull_min_dollar_volume: 8_000_000.0,
            ipo_max_bars: 250,
            ipo_min_price: 5.0,
            fundamental_min_yoy: 0.2,
        }
    }
}

impl CriteriaConfig {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        let extension_guard = env_parse("STAGE2_EXTENSION_GUARD", true);
        let variant = std::env::var("STAGE2_VARIANT").unwrap_or_default();
        out.stage2 = match variant.trim().to_ascii_lowercase().as_str() {
            "relaxed" => Stage2Rule::relaxed(),
            _ => Stage2Rule::strict(extension_guard),
        };

        if let Ok(s) = std::env::var("STAGE2_MIN_PASSED") {
            if let Ok(n) = s.trim().parse::<usize>() {
                out.stage2.min_passed = n;
            }
        }

        if let Ok(s) = std::env::var("STAGE2_MA150_WAIVER_BELOW") {
            if let Ok(n) = s.trim().parse::<u8>() {
                out.stage2.ma150_waiver_below = Some(n);
            }
        }

        out.min_rs_percentile = env_parse("MIN_RS_PERCENTILE", out.min_rs_percentile);
        out.min_price = env_parse("MIN_PRICE", out.min_price);
        out.min_avg_volume = env_parse("MIN_AVG_VOLUME", out.min_avg_volume);
        out.low_volatility_threshold =
            env_parse("LOW_VOLATILITY_THRESHOLD", out.low_volatility_threshold);
        out.recent_volume_days = env_parse("RECENT_VOLUME_DAYS", out.recent_volume_days);
        out.qull_min_percentile = env_parse("QULL_MIN_PERCENTILE", out.qull_min_percentile);
        out.qull_min_adr_pct = env_parse("QULL_MIN_ADR_PCT", out.qull_min_adr_pct);
        out.qull_min_dollar_volume = env_parse("QULL_MIN_DOLLAR_VOLUME", out.qull_min_dollar_volume);
        out.fundamental_min_yoy = env_parse("FUNDAMENTAL_MIN_YOY", out.fundamental_min_yoy);

        out
    }
}

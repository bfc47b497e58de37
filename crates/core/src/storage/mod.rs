//! Persistence behind one narrow interface.
//!
//! Each table the screener touches has a dedicated accessor on [`ScreenerStore`];
//! [`Table`] is the closed set of table names used by the SQL implementation.

use anyhow::Context;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    Listing, PriceBar, QuarterlyReport, RelativeStrengthRecord, UniverseFilter, WatchlistReport,
};
use crate::error::StoreError;

pub mod lock;
pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Tickers,
    Fundamentals,
    TradingCalendar,
    DailyKline,
    RelativeStrength,
    Report,
    Breadth,
    ScreenRuns,
}

impl Table {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tickers => "tickers",
            Self::Fundamentals => "fundamentals",
            Self::TradingCalendar => "trading_calendar",
            Self::DailyKline => "daily_kline",
            Self::RelativeStrength => "relative_strength",
            Self::Report => "report",
            Self::Breadth => "breadth",
            Self::ScreenRuns => "screen_runs",
        }
    }
}

#[derive(Debug, Clone)]
pub enum RsQuery {
    Ticker(String),
    Date(NaiveDate),
}

/// Outcome row written once per evaluated date.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: Uuid,
    pub as_of_date: NaiveDate,
    pub status: &'static str,
    pub error: Option<String>,
    pub summary: serde_json::Value,
}

#[async_trait::async_trait]
pub trait ScreenerStore: Send + Sync {
    /// Bars sorted by date ascending, optionally cut at `as_of` (inclusive) and limited to
    /// the last `max_bars` of what remains.
    async fn read_price_history(
        &self,
        ticker: &str,
        as_of: Option<NaiveDate>,
        max_bars: Option<usize>,
    ) -> Result<Vec<PriceBar>, StoreError>;

    /// Quarterly income-statement rows sorted by period end ascending.
    async fn read_fundamentals(&self, ticker: &str) -> Result<Vec<QuarterlyReport>, StoreError>;

    /// Deduplicated listings, without index/synthetic symbols.
    async fn read_universe(&self, filter: &UniverseFilter) -> Result<Vec<Listing>, StoreError>;

    /// Sorted ascending.
    async fn read_trading_calendar(&self) -> Result<Vec<NaiveDate>, StoreError>;

    /// Inserts one day's rows atomically. Rows already present are left untouched.
    async fn write_relative_strength(
        &self,
        records: &[RelativeStrengthRecord],
    ) -> Result<u64, StoreError>;

    async fn read_relative_strength(
        &self,
        query: &RsQuery,
    ) -> Result<Vec<RelativeStrengthRecord>, StoreError>;

    /// Distinct dates that already have RS rows.
    async fn rs_dates(&self) -> Result<Vec<NaiveDate>, StoreError>;

    /// Appends all of a date's reports atomically: either every row lands or none does.
    /// Writing the same report twice stores two rows.
    async fn write_reports(&self, reports: &[WatchlistReport]) -> Result<(), StoreError>;

    /// Most recently inserted report of `kind`, optionally restricted to dates before
    /// `before`.
    async fn latest_report(
        &self,
        kind: &str,
        before: Option<NaiveDate>,
    ) -> Result<Option<WatchlistReport>, StoreError>;

    async fn write_breadth(&self, date: NaiveDate, value: f64) -> Result<(), StoreError>;

    async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError>;
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;

use crate::domain::{bar, fundamentals};
use crate::domain::{
    Listing, Market, PriceBar, QuarterlyReport, RelativeStrengthRecord, UniverseFilter,
    WatchlistReport,
};
use crate::error::StoreError;
use crate::storage::{RsQuery, RunRecord, ScreenerStore};

#[derive(Default)]
struct Inner {
    listings: BTreeMap<String, (Market, bool)>,
    bars: HashMap<String, Vec<PriceBar>>,
    quarters: HashMap<String, Vec<QuarterlyReport>>,
    calendar: BTreeSet<NaiveDate>,
    rs: BTreeMap<(NaiveDate, String), RelativeStrengthRecord>,
    reports: Vec<WatchlistReport>,
    breadth: BTreeMap<NaiveDate, f64>,
    runs: Vec<RunRecord>,
    failing: HashSet<String>,
    failing_report_kinds: HashSet<String>,
    largest_history_read: usize,
}

/// In-process store for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner_mut(&mut self) -> &mut Inner {
        self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_listing(mut self, ticker: &str, market: Market) -> Self {
        self.inner_mut()
            .listings
            .insert(ticker.to_string(), (market, false));
        self
    }

    pub fn with_delisted(mut self, ticker: &str, market: Market) -> Self {
        self.inner_mut()
            .listings
            .insert(ticker.to_string(), (market, true));
        self
    }

    pub fn with_bars(mut self, bars: Vec<PriceBar>) -> Self {
        let inner = self.inner_mut();
        for bar in bars {
            inner.bars.entry(bar.ticker.clone()).or_default().push(bar);
        }
        for series in inner.bars.values_mut() {
            *series = bar::normalize(std::mem::take(series));
        }
        self
    }

    pub fn with_fundamentals(mut self, quarters: Vec<QuarterlyReport>) -> Self {
        let inner = self.inner_mut();
        for q in quarters {
            inner.quarters.entry(q.ticker.clone()).or_default().push(q);
        }
        for rows in inner.quarters.values_mut() {
            *rows = fundamentals::normalize(std::mem::take(rows));
        }
        self
    }

    pub fn with_calendar(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.inner_mut().calendar.extend(dates);
        self
    }

    pub fn with_report(mut self, report: WatchlistReport) -> Self {
        self.inner_mut().reports.push(report);
        self
    }

    /// Every history read for `ticker` fails with a non-retryable query error.
    pub fn with_failing_history(mut self, ticker: &str) -> Self {
        self.inner_mut().failing.insert(ticker.to_string());
        self
    }

    /// Any report batch containing `kind` is rejected as a whole.
    pub fn with_failing_report(mut self, kind: &str) -> Self {
        self.inner_mut().failing_report_kinds.insert(kind.to_string());
        self
    }

    pub fn reports(&self) -> Vec<WatchlistReport> {
        self.lock().reports.clone()
    }

    pub fn breadth(&self, date: NaiveDate) -> Option<f64> {
        self.lock().breadth.get(&date).copied()
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.lock().runs.clone()
    }

    /// Most bars returned by a single history read so far.
    pub fn largest_history_read(&self) -> usize {
        self.lock().largest_history_read
    }

    pub fn rs_row_count(&self) -> usize {
        self.lock().rs.len()
    }
}

#[async_trait::async_trait]
impl ScreenerStore for MemoryStore {
    async fn read_price_history(
        &self,
        ticker: &str,
        as_of: Option<NaiveDate>,
        max_bars: Option<usize>,
    ) -> Result<Vec<PriceBar>, StoreError> {
        let mut inner = self.lock();
        if inner.failing.contains(ticker) {
            return Err(StoreError::Query(format!("history unavailable for {ticker}")));
        }
        let Some(series) = inner.bars.get(ticker) else {
            return Ok(Vec::new());
        };
        let cut = match as_of {
            Some(d) => bar::history_as_of(series, d),
            None => series.as_slice(),
        };
        let start = max_bars.map_or(0, |n| cut.len().saturating_sub(n));
        let out = cut[start..].to_vec();

        inner.largest_history_read = inner.largest_history_read.max(out.len());
        Ok(out)
    }

    async fn read_fundamentals(&self, ticker: &str) -> Result<Vec<QuarterlyReport>, StoreError> {
        Ok(self.lock().quarters.get(ticker).cloned().unwrap_or_default())
    }

    async fn read_universe(&self, filter: &UniverseFilter) -> Result<Vec<Listing>, StoreError> {
        Ok(self
            .lock()
            .listings
            .iter()
            .filter(|(ticker, (market, delisted))| {
                !(filter.exclude_delisted && *delisted) && filter.admits(*market)
            })
            .map(|(ticker, (market, _))| Listing {
                ticker: ticker.clone(),
                market: *market,
            })
            .filter(|listing| !listing.is_synthetic())
            .collect())
    }

    async fn read_trading_calendar(&self) -> Result<Vec<NaiveDate>, StoreError> {
        Ok(self.lock().calendar.iter().copied().collect())
    }

    async fn write_relative_strength(
        &self,
        records: &[RelativeStrengthRecord],
    ) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let mut inserted = 0;
        for rec in records {
            let key = (rec.date, rec.ticker.clone());
            if let std::collections::btree_map::Entry::Vacant(slot) = inner.rs.entry(key) {
                slot.insert(rec.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn read_relative_strength(
        &self,
        query: &RsQuery,
    ) -> Result<Vec<RelativeStrengthRecord>, StoreError> {
        let inner = self.lock();
        let rows = match query {
            RsQuery::Date(date) => inner
                .rs
                .range((*date, String::new())..)
                .take_while(|((d, _), _)| d == date)
                .map(|(_, rec)| rec.clone())
                .collect(),
            RsQuery::Ticker(ticker) => inner
                .rs
                .values()
                .filter(|rec| &rec.ticker == ticker)
                .cloned()
                .collect(),
        };
        Ok(rows)
    }

    async fn rs_dates(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let dates: BTreeSet<NaiveDate> = self.lock().rs.keys().map(|(d, _)| *d).collect();
        Ok(dates.into_iter().collect())
    }

    async fn write_reports(&self, reports: &[WatchlistReport]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(bad) = reports
            .iter()
            .find(|r| inner.failing_report_kinds.contains(&r.kind))
        {
            return Err(StoreError::Query(format!(
                "report insert rejected for {}/{}",
                bad.date, bad.kind
            )));
        }
        inner.reports.extend_from_slice(reports);
        Ok(())
    }

    async fn latest_report(
        &self,
        kind: &str,
        before: Option<NaiveDate>,
    ) -> Result<Option<WatchlistReport>, StoreError> {
        Ok(self
            .lock()
            .reports
            .iter()
            .rev()
            .find(|r| r.kind == kind && before.map_or(true, |d| r.date < d))
            .cloned())
    }

    async fn write_breadth(&self, date: NaiveDate, value: f64) -> Result<(), StoreError> {
        self.lock().breadth.insert(date, value);
        Ok(())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        self.lock().runs.push(run.clone());
        Ok(())
    }
}

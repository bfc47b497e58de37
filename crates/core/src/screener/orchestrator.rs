use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use uuid::Uuid;

use crate::breadth::{self, BreadthReading};
use crate::criteria::{CriteriaEngine, Criterion, Evaluation};
use crate::domain::{Listing, PriceBar, QuarterlyReport, ReportKind, RsSnapshot, WatchlistReport};
use crate::error::ScreenError;
use crate::retry::RetryPolicy;
use crate::rs::{CrossSectionalRanker, MomentumRatios, MomentumScorer};
use crate::screener::market_cache::MarketCache;
use crate::screener::options::{ScreenerOptions, Shutdown};
use crate::screener::post_analysis;
use crate::screener::summary::{DateOutcome, RunSummary, ScreenResult, TickerFailure};
use crate::storage::{RunRecord, ScreenerStore};

/// How far a date is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// Scoring, ranking, criteria, post-analysis and breadth.
    Full,
    /// Scoring and ranking only; used for historical reruns.
    RelativeStrengthOnly,
}

/// Trailing bars read per ticker. Covers the 360-day momentum lookback, the 252-bar
/// floor, 250-bar extremes and MA200 sampled across five months.
pub const HISTORY_WINDOW_BARS: usize = 400;

/// Everything read for one ticker on one date.
struct TickerInputs {
    ticker: String,
    bars: Vec<PriceBar>,
    quarters: Vec<QuarterlyReport>,
}

struct CriteriaPass {
    evaluations: Vec<(String, Result<Evaluation, ScreenError>)>,
    breadth: Option<BreadthReading>,
}

/// Drives scorer, ranker and criteria engine over the universe for one date at a time.
///
/// Ranking for a date finishes, and its rows are written, before any criteria run. Writes
/// for a date happen only after the whole day is computed.
pub struct ScreenerOrchestrator {
    store: Arc<dyn ScreenerStore>,
    scorer: MomentumScorer,
    ranker: CrossSectionalRanker,
    engine: Arc<CriteriaEngine>,
    retry: RetryPolicy,
    options: ScreenerOptions,
    shutdown: Shutdown,
}

impl ScreenerOrchestrator {
    pub fn new(
        store: Arc<dyn ScreenerStore>,
        engine: CriteriaEngine,
        options: ScreenerOptions,
    ) -> Result<Self, ScreenError> {
        engine.validate()?;
        if options.concurrency == 0 {
            return Err(ScreenError::Configuration(
                "concurrency must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            store,
            scorer: MomentumScorer::default(),
            ranker: CrossSectionalRanker,
            engine: Arc::new(engine),
            retry: RetryPolicy::default(),
            options,
            shutdown: Shutdown::never(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_scorer(mut self, scorer: MomentumScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn options(&self) -> &ScreenerOptions {
        &self.options
    }

    /// Screens one trading date end to end.
    pub async fn run_date(&self, date: NaiveDate) -> Result<DateOutcome, ScreenError> {
        self.ensure_running()?;

        let calendar = self.read_calendar().await?;
        if calendar.binary_search(&date).is_err() {
            tracing::info!(%date, "not a trading day; nothing to screen");
            return Ok(DateOutcome::NotTradingDay(date));
        }

        self.screen_and_record(date, Pipeline::Full).await
    }

    /// Recomputes relative strength for every trading date in `from..=to`, oldest first.
    pub async fn run_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DateOutcome>, ScreenError> {
        if from > to {
            return Err(ScreenError::Configuration(format!(
                "range start {from} is after end {to}"
            )));
        }

        let calendar = self.read_calendar().await?;
        let dates: Vec<NaiveDate> = calendar
            .into_iter()
            .filter(|d| (from..=to).contains(d))
            .collect();
        tracing::info!(%from, %to, dates = dates.len(), "relative strength rerun");

        self.rerun(dates).await
    }

    /// Recomputes relative strength for trading dates up to `today` that have no rows yet.
    pub async fn fill_missing_rs(&self, today: NaiveDate) -> Result<Vec<DateOutcome>, ScreenError> {
        let calendar = self.read_calendar().await?;

        let store = self.store.as_ref();
        let have: HashSet<NaiveDate> = self
            .retry
            .run("rs_dates", "all", move || store.rs_dates())
            .await?
            .into_iter()
            .collect();

        let missing: Vec<NaiveDate> = calendar
            .into_iter()
            .filter(|d| *d <= today && !have.contains(d))
            .collect();
        tracing::info!(%today, missing = missing.len(), "dates without relative strength");

        self.rerun(missing).await
    }

    async fn rerun(&self, dates: Vec<NaiveDate>) -> Result<Vec<DateOutcome>, ScreenError> {
        let mut out = Vec::with_capacity(dates.len());
        for date in dates {
            if self.shutdown.is_triggered() {
                tracing::warn!(%date, done = out.len(), "shutdown requested; stopping rerun");
                break;
            }

            match self
                .screen_and_record(date, Pipeline::RelativeStrengthOnly)
                .await
            {
                Ok(outcome) => out.push(outcome),
                Err(ScreenError::Cancelled) => break,
                Err(err) => out.push(DateOutcome::Failed {
                    date,
                    error: err.to_string(),
                }),
            }
        }
        Ok(out)
    }

    async fn screen_and_record(
        &self,
        date: NaiveDate,
        pipeline: Pipeline,
    ) -> Result<DateOutcome, ScreenError> {
        let run_id = Uuid::new_v4();
        let res = self.screen(date, pipeline).await;

        match &res {
            Ok(DateOutcome::Screened(result)) => {
                result.summary.log();
                self.record_run(run_id, date, "success", None, result.summary.to_json())
                    .await;
            }
            Ok(DateOutcome::Empty(summary)) => {
                summary.log();
                self.record_run(run_id, date, "empty", None, summary.to_json())
                    .await;
            }
            Ok(_) => {}
            Err(ScreenError::Cancelled) => {
                tracing::warn!(%date, "run cancelled; nothing further written for this date");
            }
            Err(err) => {
                tracing::error!(%date, error = %err, "screen run failed");
                self.record_run(
                    run_id,
                    date,
                    "error",
                    Some(err.to_string()),
                    serde_json::Value::Null,
                )
                .await;
            }
        }

        res
    }

    async fn screen(&self, date: NaiveDate, pipeline: Pipeline) -> Result<DateOutcome, ScreenError> {
        self.ensure_running()?;

        let store = self.store.as_ref();
        let persist = self.options.persist;
        let mut summary = RunSummary::new(date, persist);

        let filter = &self.options.universe;
        let listings = self
            .retry
            .run("read_universe", "all", move || store.read_universe(filter))
            .await?;
        summary.universe = listings.len();
        if listings.is_empty() {
            tracing::warn!(%date, "universe is empty");
            return Ok(DateOutcome::Empty(summary));
        }
        let cache = MarketCache::from_listings(&listings);

        let inputs = self
            .fetch_inputs(date, pipeline, &listings, &mut summary)
            .await?;

        let mut ratios: Vec<(String, MomentumRatios)> = Vec::with_capacity(inputs.len());
        for TickerInputs { ticker, bars, .. } in &inputs {
            match self.scorer.compute_ratios(ticker, bars, date) {
                Ok(r) => ratios.push((ticker.clone(), r)),
                Err(ScreenError::InsufficientHistory { .. }) => summary.insufficient_history += 1,
                Err(ScreenError::MissingBar { .. }) => summary.missing_bar += 1,
                Err(err) => summary.failures.push(TickerFailure {
                    ticker: ticker.clone(),
                    stage: "score",
                    error: err.to_string(),
                }),
            }
        }

        let records = self.ranker.rank_snapshot(date, &ratios);
        summary.ranked = records.len();
        if records.is_empty() {
            tracing::warn!(%date, universe = summary.universe, "no eligible tickers to rank");
            return Ok(DateOutcome::Empty(summary));
        }

        self.ensure_running()?;
        if persist {
            let subject = date.to_string();
            let rows = records.as_slice();
            let written = self
                .retry
                .run("write_relative_strength", &subject, move || {
                    store.write_relative_strength(rows)
                })
                .await?;
            tracing::info!(%date, rows = rows.len(), written, "relative strength persisted");
        }

        if pipeline == Pipeline::RelativeStrengthOnly {
            return Ok(DateOutcome::Screened(ScreenResult {
                summary,
                relative_strength: records,
                reports: Vec::new(),
            }));
        }

        let rs: Arc<HashMap<String, RsSnapshot>> = Arc::new(
            records
                .iter()
                .map(|r| (r.ticker.clone(), RsSnapshot::from(r)))
                .collect(),
        );

        let pass = self
            .evaluate_all(date, inputs, Arc::clone(&rs), cache)
            .await?;

        let selected = &self.options.criteria;
        let mut lists: BTreeMap<Criterion, Vec<String>> =
            selected.iter().map(|c| (*c, Vec::new())).collect();
        for (ticker, res) in pass.evaluations {
            match res {
                Ok(eval) => {
                    summary.evaluated += 1;
                    if !eval.as_of_observed {
                        summary.stale += 1;
                    }
                    for (criterion, passed) in eval.results {
                        if let Some(list) = lists.get_mut(&criterion).filter(|_| passed) {
                            list.push(ticker.clone());
                        }
                    }
                }
                Err(err) if err.is_skip() => {}
                Err(err) => summary.failures.push(TickerFailure {
                    ticker,
                    stage: "evaluate",
                    error: err.to_string(),
                }),
            }
        }

        let mut reports = Vec::with_capacity(selected.len() + 3);
        for criterion in selected {
            let tickers = lists.remove(criterion).unwrap_or_default();
            reports.push(watchlist(date, criterion.as_str(), tickers)?);
        }

        let find = |c: Criterion| reports.iter().find(|r| r.kind == c.as_str());
        let daily_screen = match (find(Criterion::Stage2), find(Criterion::FundamentalGrowth)) {
            (Some(stage2), Some(growth)) => {
                let growing: HashSet<&str> = growth.tickers.iter().map(String::as_str).collect();
                Some(
                    stage2
                        .tickers
                        .iter()
                        .filter(|t| growing.contains(t.as_str()))
                        .cloned()
                        .collect::<Vec<String>>(),
                )
            }
            _ => None,
        };
        let post_stage2 = match (
            find(Criterion::Stage2),
            find(Criterion::SevenDayLowVolatility),
        ) {
            (Some(stage2), Some(quiet)) => Some(post_analysis::post_analysis_stage2(
                &stage2.tickers,
                &quiet.tickers,
                &rs,
            )),
            _ => None,
        };

        if let Some(tickers) = daily_screen {
            reports.push(watchlist(date, ReportKind::DAILY_SCREEN, tickers)?);
        }

        if let Some(today) = post_stage2 {
            let kind = ReportKind::POST_ANALYSIS_STAGE2;
            let previous = self
                .retry
                .run("latest_report", kind, move || {
                    store.latest_report(kind, Some(date))
                })
                .await?;

            let diff = match previous {
                Some(prev) => Some(post_analysis::stage2_diff(&today, &prev.tickers)),
                None => {
                    tracing::info!(%date, "no earlier post-analysis report; skipping stage2 diff");
                    None
                }
            };

            reports.push(watchlist(date, kind, today)?);
            if let Some(diff) = diff {
                reports.push(watchlist(date, ReportKind::STAGE2_DIFF, diff)?);
            }
        }

        for report in &reports {
            summary
                .watchlists
                .insert(report.kind.clone(), report.tickers.len());
        }
        summary.breadth = pass.breadth.map(|b| b.value);

        self.ensure_running()?;
        if persist {
            let subject = date.to_string();
            let batch = reports.as_slice();
            self.retry
                .run("write_reports", &subject, move || store.write_reports(batch))
                .await?;
            tracing::info!(%date, reports = batch.len(), "watch-lists persisted");

            if let Some(reading) = pass.breadth {
                let subject = date.to_string();
                self.retry
                    .run("write_breadth", &subject, move || {
                        store.write_breadth(date, reading.value)
                    })
                    .await?;
                tracing::info!(
                    %date,
                    value = reading.value,
                    eligible = reading.eligible,
                    above = reading.above,
                    "breadth persisted"
                );
            }
        }

        Ok(DateOutcome::Screened(ScreenResult {
            summary,
            relative_strength: records,
            reports,
        }))
    }

    /// Reads every listing's trailing history (and quarterly statements when a selected
    /// criterion needs them) with bounded concurrency. Failed history reads are recorded on
    /// the summary and left out; the result is sorted by ticker.
    async fn fetch_inputs(
        &self,
        date: NaiveDate,
        pipeline: Pipeline,
        listings: &[Listing],
        summary: &mut RunSummary,
    ) -> Result<Vec<TickerInputs>, ScreenError> {
        let store = self.store.as_ref();
        let retry = self.retry;
        let total = listings.len();
        let progress_every = self.options.progress_every;
        let with_fundamentals = pipeline == Pipeline::Full
            && self.options.criteria.iter().any(Criterion::needs_fundamentals);

        let mut fetches = stream::iter(listings.iter().map(|l| l.ticker.as_str()))
            .map(move |ticker| async move {
                let bars = retry
                    .run("read_price_history", ticker, move || {
                        store.read_price_history(ticker, Some(date), Some(HISTORY_WINDOW_BARS))
                    })
                    .await;
                let quarters = match &bars {
                    Ok(_) if with_fundamentals => Some(
                        retry
                            .run("read_fundamentals", ticker, move || {
                                store.read_fundamentals(ticker)
                            })
                            .await,
                    ),
                    _ => None,
                };
                (ticker, bars, quarters)
            })
            .buffer_unordered(self.options.concurrency.max(1));

        let mut out = Vec::with_capacity(total);
        let mut done: usize = 0;
        while let Some((ticker, bars, quarters)) = fetches.next().await {
            done += 1;
            match bars {
                Ok(bars) => {
                    let quarters = match quarters {
                        Some(Ok(rows)) => rows,
                        Some(Err(err)) => {
                            // Price criteria still run; the growth check fails closed.
                            summary.failures.push(TickerFailure {
                                ticker: ticker.to_string(),
                                stage: "read_fundamentals",
                                error: err.to_string(),
                            });
                            Vec::new()
                        }
                        None => Vec::new(),
                    };
                    out.push(TickerInputs {
                        ticker: ticker.to_string(),
                        bars,
                        quarters,
                    });
                }
                Err(err) => summary.failures.push(TickerFailure {
                    ticker: ticker.to_string(),
                    stage: "read_price_history",
                    error: err.to_string(),
                }),
            }

            if progress_every > 0 && done % progress_every == 0 {
                tracing::info!(%date, done, total, "price history fetch progress");
            }
            self.ensure_running()?;
        }

        out.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        summary.fetched = out.len();
        Ok(out)
    }

    /// Runs the criteria pass and the breadth reading on the rayon pool.
    async fn evaluate_all(
        &self,
        date: NaiveDate,
        inputs: Vec<TickerInputs>,
        rs: Arc<HashMap<String, RsSnapshot>>,
        cache: MarketCache,
    ) -> Result<CriteriaPass, ScreenError> {
        let engine = Arc::clone(&self.engine);
        let selected = self.options.criteria.clone();

        tokio::task::spawn_blocking(move || {
            let evaluations: Vec<(String, Result<Evaluation, ScreenError>)> = inputs
                .par_iter()
                .map(|input| {
                    let snapshot = rs.get(&input.ticker).copied().unwrap_or_default();
                    let res = engine.evaluate_with_fundamentals(
                        &input.ticker,
                        &input.bars,
                        &input.quarters,
                        date,
                        &snapshot,
                        &selected,
                    );
                    (input.ticker.clone(), res)
                })
                .collect();

            // `inputs` is sorted by ticker.
            let breadth = breadth::naa200r(date, &cache, |ticker| {
                inputs
                    .binary_search_by(|input| input.ticker.as_str().cmp(ticker))
                    .ok()
                    .map(|i| inputs[i].bars.as_slice())
            });

            CriteriaPass {
                evaluations,
                breadth,
            }
        })
        .await
        .map_err(|err| ScreenError::Worker(err.to_string()))
    }

    async fn read_calendar(&self) -> Result<Vec<NaiveDate>, ScreenError> {
        let store = self.store.as_ref();
        let mut calendar = self
            .retry
            .run("read_trading_calendar", "all", move || {
                store.read_trading_calendar()
            })
            .await?;
        calendar.sort_unstable();
        calendar.dedup();
        Ok(calendar)
    }

    async fn record_run(
        &self,
        id: Uuid,
        date: NaiveDate,
        status: &'static str,
        error: Option<String>,
        summary: serde_json::Value,
    ) {
        if !self.options.persist {
            return;
        }

        let run = RunRecord {
            id,
            as_of_date: date,
            status,
            error,
            summary,
        };
        let store = self.store.as_ref();
        let run_ref = &run;
        let subject = date.to_string();
        if let Err(err) = self
            .retry
            .run("record_run", &subject, move || store.record_run(run_ref))
            .await
        {
            tracing::warn!(%date, %id, error = %err, "failed to record screen run");
        }
    }

    fn ensure_running(&self) -> Result<(), ScreenError> {
        if self.shutdown.is_triggered() {
            Err(ScreenError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn watchlist(
    date: NaiveDate,
    kind: &str,
    tickers: Vec<String>,
) -> Result<WatchlistReport, ScreenError> {
    WatchlistReport::new(date, kind, tickers)
        .map_err(|err| ScreenError::Configuration(format!("{err:#}")))
}

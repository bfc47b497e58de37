use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use std::sync::Arc;
use stockwiz_core::criteria::{CriteriaConfig, CriteriaEngine};
use stockwiz_core::screener::{DateOutcome, ScreenerOptions, ScreenerOrchestrator, Shutdown};
use stockwiz_core::storage::{lock, PgStore};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "stockwiz_worker")]
struct Args {
    /// Market as-of date (YYYY-MM-DD). Defaults to the latest completed New York session.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Run every stage but write nothing to the database.
    #[arg(long)]
    dry_run: bool,

    /// Recompute relative strength for trading dates from this date (inclusive).
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Last date (inclusive) of the relative strength rerun.
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    /// Recompute relative strength for every past trading date that has none.
    #[arg(long, conflicts_with_all = ["from", "to"])]
    fill_missing_rs: bool,
}

enum Mode {
    Daily(NaiveDate),
    Range(NaiveDate, NaiveDate),
    FillMissing(NaiveDate),
}

impl Mode {
    fn lock_date(&self) -> NaiveDate {
        match self {
            Self::Daily(d) | Self::FillMissing(d) => *d,
            Self::Range(_, to) => *to,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockwiz_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let as_of_date = stockwiz_core::time::us_market::resolve_as_of_date(
        args.as_of_date.as_deref(),
        chrono::Utc::now(),
    )?;
    let mode = match (args.from, args.to, args.fill_missing_rs) {
        (Some(from), Some(to), _) => Mode::Range(from, to),
        (_, _, true) => Mode::FillMissing(as_of_date),
        _ => Mode::Daily(as_of_date),
    };

    let mut options = ScreenerOptions::from_env()?;
    options.persist = !args.dry_run;

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(options.concurrency.clamp(2, 32) as u32 + 1)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    if !args.dry_run {
        stockwiz_core::storage::migrate(&pool).await?;
    }

    let (trigger, shutdown) = Shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("shutdown signal received; stopping before the next write");
            trigger.trigger();
        }
    });

    let engine = CriteriaEngine::new(CriteriaConfig::from_env());
    let store = Arc::new(PgStore::new(pool.clone()));
    let orchestrator = ScreenerOrchestrator::new(store, engine, options)?
        .with_retry(settings.retry_policy())
        .with_shutdown(shutdown);

    // Dry runs write nothing, so they never contend for the date.
    let mut lock_conn = None;
    if !args.dry_run {
        let lock_date = mode.lock_date();
        let mut conn = pool.acquire().await.context("acquire lock connection failed")?;
        if !lock::try_acquire_date_lock(&mut conn, lock_date).await? {
            tracing::warn!(%lock_date, "date lock not acquired; another run in progress");
            return Ok(());
        }
        lock_conn = Some((conn, lock_date));
    }

    let res = run(&orchestrator, &mode, args.dry_run).await;
    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "screener run failed");
    }

    if let Some((mut conn, lock_date)) = lock_conn {
        let _ = lock::release_date_lock(&mut conn, lock_date).await;
    }
    res
}

async fn run(orchestrator: &ScreenerOrchestrator, mode: &Mode, dry_run: bool) -> anyhow::Result<()> {
    match *mode {
        Mode::Daily(date) => {
            let outcome = orchestrator
                .run_date(date)
                .await
                .with_context(|| format!("screen run for {date} failed"))?;
            match outcome {
                DateOutcome::NotTradingDay(date) => {
                    tracing::info!(%date, "not a trading day; nothing to do");
                }
                DateOutcome::Empty(summary) => {
                    tracing::warn!(%date, universe = summary.universe, "no eligible tickers");
                }
                DateOutcome::Screened(result) => {
                    for report in &result.reports {
                        tracing::info!(
                            %date,
                            kind = %report.kind,
                            tickers = report.tickers.len(),
                            dry_run,
                            "watch-list ready"
                        );
                    }
                    if dry_run {
                        println!("{}", serde_json::to_string_pretty(&result.summary.to_json())?);
                    }
                }
                DateOutcome::Failed { date, error } => {
                    anyhow::bail!("screen run for {date} failed: {error}");
                }
            }
        }
        Mode::Range(from, to) => {
            let outcomes = orchestrator
                .run_range(from, to)
                .await
                .with_context(|| format!("relative strength rerun {from}..={to} failed"))?;
            log_rerun(&outcomes);
        }
        Mode::FillMissing(today) => {
            let outcomes = orchestrator
                .fill_missing_rs(today)
                .await
                .with_context(|| format!("filling missing relative strength up to {today} failed"))?;
            log_rerun(&outcomes);
        }
    }
    Ok(())
}

fn log_rerun(outcomes: &[DateOutcome]) {
    let mut screened = 0;
    let mut empty = 0;
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome {
            DateOutcome::Screened(_) => screened += 1,
            DateOutcome::Empty(_) | DateOutcome::NotTradingDay(_) => empty += 1,
            DateOutcome::Failed { date, .. } => failed.push(*date),
        }
    }
    tracing::info!(
        dates = outcomes.len(),
        screened,
        empty,
        failed = failed.len(),
        "relative strength rerun finished"
    );
    if !failed.is_empty() {
        tracing::warn!(dates = ?failed, "dates to reprocess");
    }
}

fn init_sentry(settings: &stockwiz_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

use tokio::sync::watch;

use crate::config::env_parse;
use crate::criteria::Criterion;
use crate::domain::UniverseFilter;

const DEFAULT_CONCURRENCY: usize = 16;
const DEFAULT_PROGRESS_EVERY: usize = 500;

#[derive(Debug, Clone)]
pub struct ScreenerOptions {
    /// Price-history reads in flight at once.
    pub concurrency: usize,
    /// Log fetch progress every N tickers; 0 disables.
    pub progress_every: usize,
    /// Criteria evaluated and persisted as watch-lists, in report order.
    pub criteria: Vec<Criterion>,
    pub universe: UniverseFilter,
    /// When false every stage runs but nothing is written.
    pub persist: bool,
}

impl Default for ScreenerOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            progress_every: DEFAULT_PROGRESS_EVERY,
            criteria: Criterion::ALL.to_vec(),
            universe: UniverseFilter::default(),
            persist: true,
        }
    }
}

impl ScreenerOptions {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::default();
        out.concurrency = env_parse("SCREEN_CONCURRENCY", out.concurrency);
        out.progress_every = env_parse("SCREEN_PROGRESS_EVERY", out.progress_every);

        anyhow::ensure!(out.concurrency >= 1, "SCREEN_CONCURRENCY must be >= 1");

        if let Ok(s) = std::env::var("SCREEN_CRITERIA") {
            if !s.trim().is_empty() {
                out.criteria = Criterion::parse_list(&s)?;
            }
        }

        Ok(out)
    }
}

/// Sender half of the stop signal. Dropping it does not trigger a stop.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Checked by the orchestrator between dates and before each write phase.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn channel() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    /// A handle that never fires.
    pub fn never() -> Self {
        Self::channel().1
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

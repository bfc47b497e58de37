//! Daily screening pipeline: universe, history, scoring, ranking, criteria, watch-lists.

pub mod market_cache;
pub mod options;
pub mod orchestrator;
pub mod post_analysis;
pub mod summary;

pub use market_cache::MarketCache;
pub use options::{ScreenerOptions, Shutdown, ShutdownTrigger};
pub use orchestrator::{Pipeline, ScreenerOrchestrator, HISTORY_WINDOW_BARS};
pub use summary::{DateOutcome, RunSummary, ScreenResult, TickerFailure};

//! IBD-style relative strength.
//!
//! Composite score = 40% of the 3 month ratio plus 20% each of the 6, 9 and 12 month
//! ratios, ranked across the day's universe into a 0-100 percentile.

pub mod momentum;
pub mod ranker;

pub use momentum::{MomentumRatios, MomentumScorer, MIN_HISTORY_BARS};
pub use ranker::CrossSectionalRanker;

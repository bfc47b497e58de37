pub mod bar;
pub mod fundamentals;
pub mod listing;
pub mod relative_strength;
pub mod report;

pub use bar::PriceBar;
pub use fundamentals::QuarterlyReport;
pub use listing::{Listing, Market, UniverseFilter};
pub use relative_strength::{RelativeStrengthRecord, RsSnapshot};
pub use report::{ReportKind, WatchlistReport};

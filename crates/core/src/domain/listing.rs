use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    Nasdaq,
    Nyse,
    Amex,
    Other,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nasdaq => "NASDAQ",
            Self::Nyse => "NYSE",
            Self::Amex => "AMEX",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "NASDAQ" => Self::Nasdaq,
            "NYSE" => Self::Nyse,
            "AMEX" | "NYSEAMERICAN" | "NYSE AMERICAN" => Self::Amex,
            _ => Self::Other,
        })
    }
}

/// A tradable symbol in the screening universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub ticker: String,
    pub market: Market,
}

impl Listing {
    /// Index and other synthetic symbols are prefixed with `^` (e.g. `^GSPC`).
    pub fn is_synthetic(&self) -> bool {
        self.ticker.starts_with('^')
    }
}

#[derive(Debug, Clone)]
pub struct UniverseFilter {
    pub exclude_delisted: bool,
    /// `None` keeps every market.
    pub markets: Option<Vec<Market>>,
}

impl Default for UniverseFilter {
    fn default() -> Self {
        Self {
            exclude_delisted: true,
            markets: None,
        }
    }
}

impl UniverseFilter {
    pub fn admits(&self, market: Market) -> bool {
        self.markets
            .as_ref()
            .map_or(true, |markets| markets.contains(&market))
    }
}

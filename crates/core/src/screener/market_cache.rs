use std::collections::BTreeMap;

use crate::domain::{Listing, Market};

/// Ticker to market mapping for a single run, built once from the universe read.
#[derive(Debug, Clone, Default)]
pub struct MarketCache {
    markets: BTreeMap<String, Market>,
}

impl MarketCache {
    pub fn from_listings(listings: &[Listing]) -> Self {
        Self {
            markets: listings
                .iter()
                .map(|l| (l.ticker.clone(), l.market))
                .collect(),
        }
    }

    pub fn market(&self, ticker: &str) -> Option<Market> {
        self.markets.get(ticker).copied()
    }

    /// Tickers listed on `market`, in ascending order.
    pub fn tickers_in(&self, market: Market) -> impl Iterator<Item = &str> + '_ {
        self.markets
            .iter()
            .filter(move |(_, m)| **m == market)
            .map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

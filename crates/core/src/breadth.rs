//! NAA200R: share of NASDAQ names trading at or above their 200-day average.

use chrono::NaiveDate;

use crate::criteria::indicators::sma_last;
use crate::domain::bar::{history_as_of, PriceBar};
use crate::domain::Market;
use crate::screener::MarketCache;

const MA_PERIOD: usize = 200;
const MAX_SYMBOL_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreadthReading {
    pub date: NaiveDate,
    pub eligible: usize,
    pub above: usize,
    pub value: f64,
}

/// Ordinary shares only; longer NASDAQ symbols are warrants, units and rights.
pub fn is_eligible(ticker: &str, market: Option<Market>) -> bool {
    market == Some(Market::Nasdaq) && ticker.len() <= MAX_SYMBOL_LEN
}

/// Computes the reading for `date` from the bars `history` returns per ticker. A listing
/// counts only when it has a bar on `date` and enough history for MA200. Returns `None`
/// when nothing qualifies.
pub fn naa200r<'a>(
    date: NaiveDate,
    cache: &MarketCache,
    history: impl Fn(&str) -> Option<&'a [PriceBar]>,
) -> Option<BreadthReading> {
    let mut eligible = 0;
    let mut above = 0;

    for ticker in cache.tickers_in(Market::Nasdaq) {
        if !is_eligible(ticker, cache.market(ticker)) {
            continue;
        }
        let Some(bars) = history(ticker) else {
            continue;
        };
        let history = history_as_of(bars, date);
        if history.last().map(|b| b.date) != Some(date) {
            continue;
        }

        let adj: Vec<f64> = history.iter().map(|b| b.adj_close).collect();
        let ma200 = sma_last(&adj, MA_PERIOD);
        if !ma200.is_finite() {
            continue;
        }

        eligible += 1;
        if adj[adj.len() - 1] >= ma200 {
            above += 1;
        }
    }

    (eligible > 0).then(|| BreadthReading {
        date,
        eligible,
        above,
        value: above as f64 / eligible as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Listing;
    use chrono::Duration;
    use std::collections::HashMap;

    fn series(ticker: &str, end: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
        let start = end - Duration::days(closes.len() as i64 - 1);
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                ticker: ticker.to_string(),
                date: start + Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                adj_close: c,
                volume: 1_000,
            })
            .collect()
    }

    fn listing(ticker: &str, market: Market) -> Listing {
        Listing {
            ticker: ticker.to_string(),
            market,
        }
    }

    #[test]
    fn counts_eligible_nasdaq_names() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let up: Vec<f64> = (0..250).map(|i| 10.0 + i as f64).collect();
        let down: Vec<f64> = (0..250).map(|i| 300.0 - i as f64).collect();

        let cache = MarketCache::from_listings(&[
            listing("UP", Market::Nasdaq),
            listing("DOWN", Market::Nasdaq),
            listing("SHRT", Market::Nasdaq),
            listing("WARRW", Market::Nasdaq),
            listing("NYSE", Market::Nyse),
        ]);
        let histories: HashMap<String, Vec<PriceBar>> = [
            ("UP", series("UP", date, &up)),
            ("DOWN", series("DOWN", date, &down)),
            // Too short for MA200.
            ("SHRT", series("SHRT", date, &up[..100])),
            ("WARRW", series("WARRW", date, &up)),
            ("NYSE", series("NYSE", date, &up)),
        ]
        .into_iter()
        .map(|(t, b)| (t.to_string(), b))
        .collect();

        let reading = naa200r(date, &cache, |t| histories.get(t).map(Vec::as_slice)).unwrap();
        assert_eq!(reading.eligible, 2);
        assert_eq!(reading.above, 1);
        assert!((reading.value - 0.5).abs() < 1e-12);
    }

    #[test]
    fn none_without_eligible_listings() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let cache = MarketCache::from_listings(&[listing("IBM", Market::Nyse)]);
        assert!(naa200r(date, &cache, |_| None).is_none());
    }

    #[test]
    fn requires_bar_on_date() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let closes: Vec<f64> = (0..250).map(|i| 10.0 + i as f64).collect();
        let cache = MarketCache::from_listings(&[listing("OLD", Market::Nasdaq)]);
        let histories = HashMap::from([(
            "OLD".to_string(),
            series("OLD", date - Duration::days(5), &closes),
        )]);
        assert!(naa200r(date, &cache, |t| histories.get(t).map(Vec::as_slice)).is_none());
    }
}

//! Cross-sectional percentile ranking.
//!
//! Rank 1 is the lowest score; tied scores share the average of the ranks they span.
//! `percentile = round(rank / count * 100)`, clamped to 0..=100.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::RelativeStrengthRecord;
use crate::rs::momentum::MomentumRatios;

#[derive(Debug, Clone, Copy, Default)]
pub struct CrossSectionalRanker;

impl CrossSectionalRanker {
    /// Ranks one score series for a single day. Non-finite scores are dropped.
    pub fn rank<'a, I>(&self, scores: I) -> BTreeMap<String, u8>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut entries: Vec<(&str, f64)> = scores
            .into_iter()
            .filter(|(_, score)| score.is_finite())
            .collect();

        // Ticker as secondary key keeps the order independent of input order.
        entries.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        let count = entries.len();
        let mut out = BTreeMap::new();
        let mut start = 0;
        while start < count {
            let mut end = start + 1;
            while end < count && entries[end].1 == entries[start].1 {
                end += 1;
            }

            // Positions start..end hold ranks start+1..=end.
            let avg_rank = (start + 1 + end) as f64 / 2.0;
            let pct = percentile(avg_rank, count);
            for (ticker, _) in &entries[start..end] {
                out.insert((*ticker).to_string(), pct);
            }
            start = end;
        }

        out
    }

    /// Ranks composite, M1, M3 and M6 independently and emits a record for every ticker
    /// that received a composite percentile.
    pub fn rank_snapshot(
        &self,
        date: NaiveDate,
        ratios: &[(String, MomentumRatios)],
    ) -> Vec<RelativeStrengthRecord> {
        let series = |pick: fn(&MomentumRatios) -> Option<f64>| {
            self.rank(
                ratios
                    .iter()
                    .filter_map(|(t, r)| pick(r).map(|s| (t.as_str(), s))),
            )
        };

        let composite = series(MomentumRatios::composite);
        let m1 = series(MomentumRatios::m1);
        let m3 = series(MomentumRatios::m3);
        let m6 = series(MomentumRatios::m6);

        composite
            .into_iter()
            .map(|(ticker, rscore)| RelativeStrengthRecord {
                m1: m1.get(&ticker).copied(),
                m3: m3.get(&ticker).copied(),
                m6: m6.get(&ticker).copied(),
                ticker,
                date,
                rscore,
            })
            .collect()
    }
}

fn percentile(rank: f64, count: usize) -> u8 {
    (rank / count as f64 * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("T{i:02}")).collect()
    }

    #[test]
    fn twenty_ticker_cross_section() {
        let names = tickers(20);
        let ranks = CrossSectionalRanker.rank(
            names
                .iter()
                .enumerate()
                .map(|(i, t)| (t.as_str(), (i + 1) as f64)),
        );
        assert_eq!(ranks["T20"], 100);
        assert_eq!(ranks["T01"], 5);
        assert_eq!(ranks["T10"], 50);
    }

    #[test]
    fn ties_share_average_rank() {
        let ranks = CrossSectionalRanker.rank([("A", 1.0), ("B", 2.0), ("C", 2.0), ("D", 3.0)]);
        // B and C span ranks 2 and 3 -> 2.5 / 4 -> 62.5 -> 63.
        assert_eq!(ranks["B"], 63);
        assert_eq!(ranks["C"], 63);
        assert_eq!(ranks["A"], 25);
        assert_eq!(ranks["D"], 100);
    }

    #[test]
    fn drops_nan_and_infinite() {
        let ranks = CrossSectionalRanker.rank([("A", f64::NAN), ("B", 1.0), ("C", f64::INFINITY)]);
        assert_eq!(ranks.len(), 1);
        assert_eq!(ranks["B"], 100);
    }

    #[test]
    fn empty_input() {
        let ranks = CrossSectionalRanker.rank(std::iter::empty::<(&str, f64)>());
        assert!(ranks.is_empty());
    }

    #[test]
    fn snapshot_ranks_series_independently() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let full = |x: f64, m1: f64| MomentumRatios {
            ratio_30d: Some(m1),
            ratio_90d: Some(x),
            ratio_180d: Some(x),
            ratio_270d: Some(x),
            ratio_360d: Some(x),
        };
        let ratios = vec![
            ("AAA".to_string(), full(2.0, 0.5)),
            ("BBB".to_string(), full(1.0, 1.5)),
            (
                "CCC".to_string(),
                MomentumRatios {
                    ratio_360d: None,
                    ..full(3.0, 3.0)
                },
            ),
        ];
        let records = CrossSectionalRanker.rank_snapshot(date, &ratios);
        assert_eq!(records.len(), 2);
        let aaa = records.iter().find(|r| r.ticker == "AAA").unwrap();
        let bbb = records.iter().find(|r| r.ticker == "BBB").unwrap();
        assert_eq!(aaa.rscore, 100);
        assert_eq!(bbb.rscore, 50);
        // CCC has no composite but still takes part in the M1 cross-section.
        assert_eq!(aaa.m1, Some(33));
        assert_eq!(bbb.m1, Some(67));
    }
}

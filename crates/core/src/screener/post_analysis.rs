//! Watch-lists derived from the day's criterion lists.

use std::collections::{HashMap, HashSet};

use crate::domain::RsSnapshot;

/// Tickers in both `stage2` and `low_volatility`, strongest composite RS first.
pub fn post_analysis_stage2(
    stage2: &[String],
    low_volatility: &[String],
    rs: &HashMap<String, RsSnapshot>,
) -> Vec<String> {
    let quiet: HashSet<&str> = low_volatility.iter().map(String::as_str).collect();
    let mut out: Vec<String> = stage2
        .iter()
        .filter(|t| quiet.contains(t.as_str()))
        .cloned()
        .collect();

    let score = |t: &String| rs.get(t).and_then(|s| s.composite);
    out.sort_by(|a, b| score(b).cmp(&score(a)).then_with(|| a.cmp(b)));
    out
}

/// Tickers in `today` that were absent from `previous`, in `today`'s order.
pub fn stage2_diff(today: &[String], previous: &[String]) -> Vec<String> {
    let seen: HashSet<&str> = previous.iter().map(String::as_str).collect();
    today
        .iter()
        .filter(|t| !seen.contains(t.as_str()))
        .cloned()
        .collect()
}

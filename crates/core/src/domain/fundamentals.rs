use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One quarterly income-statement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyReport {
    pub ticker: String,
    /// Fiscal period end.
    pub report_date: NaiveDate,
    pub sales: f64,
    pub net_income: f64,
    pub gross_margin_ratio: f64,
}

/// Quarters reported on or before `as_of`. `reports` must be sorted by `report_date`
/// ascending.
pub fn reported_as_of(reports: &[QuarterlyReport], as_of: NaiveDate) -> &[QuarterlyReport] {
    let end = reports.partition_point(|r| r.report_date <= as_of);
    &reports[..end]
}

/// Sorts by period end and keeps the last row seen for a period.
pub fn normalize(mut reports: Vec<QuarterlyReport>) -> Vec<QuarterlyReport> {
    reports.sort_by_key(|r| r.report_date);
    let mut out: Vec<QuarterlyReport> = Vec::with_capacity(reports.len());
    for r in reports {
        match out.last_mut() {
            Some(last) if last.report_date == r.report_date => *last = r,
            _ => out.push(r),
        }
    }
    out
}

//! Quarterly growth checks on income-statement rows.

use crate::domain::QuarterlyReport;

/// Quarters between a period and the same period one year earlier.
pub const YOY_PERIODS: usize = 4;

/// `(x[t] - x[t-periods]) / x[t-periods]` for the latest value. `NaN` when the series is
/// too short, either value is non-finite, or the base is zero.
pub fn pct_change_last(values: &[f64], periods: usize) -> f64 {
    let n = values.len();
    if periods == 0 || n <= periods {
        return f64::NAN;
    }
    let (base, last) = (values[n - 1 - periods], values[n - 1]);
    if !base.is_finite() || !last.is_finite() || base == 0.0 {
        return f64::NAN;
    }
    (last - base) / base
}

/// Latest quarter's sales and net income both grew by more than `min_growth` year over
/// year. `reports` must be sorted by period end ascending.
pub fn sales_and_income_growth(reports: &[QuarterlyReport], min_growth: f64) -> bool {
    let sales: Vec<f64> = reports.iter().map(|r| r.sales).collect();
    let income: Vec<f64> = reports.iter().map(|r| r.net_income).collect();
    pct_change_last(&sales, YOY_PERIODS) > min_growth
        && pct_change_last(&income, YOY_PERIODS) > min_growth
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Months, NaiveDate};

    fn quarters(rows: &[(f64, f64)]) -> Vec<QuarterlyReport> {
        let start = NaiveDate::from_ymd_opt(2022, 3, 31).unwrap();
        rows.iter()
            .enumerate()
            .map(|(i, &(sales, net_income))| QuarterlyReport {
                ticker: "AAA".to_string(),
                report_date: start + Months::new(3 * i as u32),
                sales,
                net_income,
                gross_margin_ratio: 0.4,
            })
            .collect()
    }

    #[test]
    fn compares_with_same_quarter_last_year() {
        let v = [100.0, 1.0, 1.0, 1.0, 130.0];
        assert!((pct_change_last(&v, 4) - 0.3).abs() < 1e-12);
        assert!(pct_change_last(&v[1..], 4).is_nan());
        assert!(pct_change_last(&[0.0, 1.0, 1.0, 1.0, 5.0], 4).is_nan());
    }

    #[test]
    fn both_lines_must_grow() {
        let growing = quarters(&[
            (100.0, 10.0),
            (105.0, 11.0),
            (110.0, 12.0),
            (115.0, 13.0),
            (125.0, 12.5),
        ]);
        assert!(sales_and_income_growth(&growing, 0.2));

        let flat_income = quarters(&[
            (100.0, 10.0),
            (105.0, 11.0),
            (110.0, 12.0),
            (115.0, 13.0),
            (125.0, 11.0),
        ]);
        assert!(!sales_and_income_growth(&flat_income, 0.2));
    }

    #[test]
    fn short_or_zero_base_fails() {
        let short = quarters(&[(100.0, 10.0), (200.0, 20.0), (300.0, 30.0), (400.0, 40.0)]);
        assert!(!sales_and_income_growth(&short, 0.2));

        let zero_base = quarters(&[
            (100.0, 0.0),
            (105.0, 11.0),
            (110.0, 12.0),
            (115.0, 13.0),
            (125.0, 5.0),
        ]);
        assert!(!sales_and_income_growth(&zero_base, 0.2));
        assert!(!sales_and_income_growth(&[], 0.2));
    }
}

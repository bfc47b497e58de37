use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use std::collections::HashSet;

// If the job runs before this time (New York), treat it as the previous market date.
// Regular session closes at 16:00; the extra half hour leaves room for end-of-day bars.
const CLOSE_CUTOFF_HOUR_NY: u32 = 16;
const CLOSE_CUTOFF_MINUTE_NY: u32 = 30;

/// Default as-of date for a run. Only picks the date; whether it is screened is decided by
/// the `trading_calendar` table, which also covers ad-hoc closures.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return Ok(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?);
    }

    let now_ny = now_utc.with_timezone(&New_York);

    let cutoff_reached =
        (now_ny.hour(), now_ny.minute()) >= (CLOSE_CUTOFF_HOUR_NY, CLOSE_CUTOFF_MINUTE_NY);
    let mut date = now_ny.date_naive();
    if !cutoff_reached {
        date -= Duration::days(1);
    }

    let holidays = configured_holidays(date.year() - 1..=date.year());
    while !is_business_day(date, &holidays) {
        date -= Duration::days(1);
    }

    Ok(date)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn is_business_day(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> bool {
    !is_weekend(date) && !holidays.contains(&date)
}

fn configured_holidays(years: std::ops::RangeInclusive<i32>) -> HashSet<NaiveDate> {
    // Extra closures via US_MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD".
    let mut out: HashSet<NaiveDate> = years.flat_map(nyse_holidays).collect();

    if let Ok(s) = std::env::var("US_MARKET_HOLIDAYS") {
        out.extend(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .filter_map(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok()),
        );
    }

    out
}

/// Regular NYSE full-day closures for `year`, on the weekday they are observed.
pub fn nyse_holidays(year: i32) -> Vec<NaiveDate> {
    let fixed = |m: u32, d: u32| NaiveDate::from_ymd_opt(year, m, d);
    let nth = |m: u32, wd: Weekday, n: u8| NaiveDate::from_weekday_of_month_opt(year, m, wd, n);

    let mut out = Vec::with_capacity(10);

    // New Year's Day on a Saturday is not observed on the previous Friday.
    if let Some(d) = fixed(1, 1) {
        match d.weekday() {
            Weekday::Sat => {}
            Weekday::Sun => out.push(d + Duration::days(1)),
            _ => out.push(d),
        }
    }
    out.extend(nth(1, Weekday::Mon, 3));
    out.extend(nth(2, Weekday::Mon, 3));
    out.extend(easter_sunday(year).map(|d| d - Duration::days(2)));
    out.extend(nth(5, Weekday::Mon, 5).or_else(|| nth(5, Weekday::Mon, 4)));
    if year >= 2022 {
        out.extend(fixed(6, 19).map(observed));
    }
    out.extend(fixed(7, 4).map(observed));
    out.extend(nth(9, Weekday::Mon, 1));
    out.extend(nth(11, Weekday::Thu, 4));
    out.extend(fixed(12, 25).map(observed));

    out
}

/// Saturday holidays close the Friday before, Sunday holidays the Monday after.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Gregorian Easter (anonymous algorithm).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let n = h + l - 7 * m + 114;
    NaiveDate::from_ymd_opt(year, (n / 31) as u32, (n % 31 + 1) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 8, 0, 0).unwrap();
        let d = resolve_as_of_date(Some("2024-03-15"), now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert!(resolve_as_of_date(Some("15/03/2024"), now).is_err());
    }

    #[test]
    fn rolls_back_on_weekend() {
        // 2026-01-03 is Saturday; 20:00 UTC = 15:00 New York.
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 20, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
    }

    #[test]
    fn uses_previous_day_before_cutoff() {
        // 2026-01-06 21:00 UTC = 16:00 EST, before the 16:30 cutoff.
        let now = Utc.with_ymd_and_hms(2026, 1, 6, 21, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
    }

    #[test]
    fn uses_same_day_after_cutoff() {
        // 2026-01-06 22:00 UTC = 17:00 EST.
        let now = Utc.with_ymd_and_hms(2026, 1, 6, 22, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 6).unwrap());
    }

    #[test]
    fn follows_daylight_saving() {
        // 2026-07-06 20:45 UTC = 16:45 EDT, after the cutoff.
        let now = Utc.with_ymd_and_hms(2026, 7, 6, 20, 45, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 7, 6).unwrap());
    }

    #[test]
    fn skips_fixed_holiday() {
        // 2026-01-01 (Thursday) 23:00 UTC = 18:00 EST on a holiday.
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 23, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn skips_observed_christmas() {
        // 2022-12-25 is a Sunday, closed Monday 2022-12-26; 22:00 UTC = 17:00 EST.
        let now = Utc.with_ymd_and_hms(2022, 12, 26, 22, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2022, 12, 23).unwrap());
    }

    #[test]
    fn skips_good_friday() {
        // 2024-03-29 22:00 UTC = 18:00 EDT.
        let now = Utc.with_ymd_and_hms(2024, 3, 29, 22, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 3, 28).unwrap());
    }

    #[test]
    fn holiday_table() {
        let ymd = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();

        let h2021 = nyse_holidays(2021);
        assert!(h2021.contains(&ymd(2021, 12, 24)));
        assert!(h2021.contains(&ymd(2021, 7, 5)));
        assert!(!h2021.iter().any(|d| d.month() == 6 && d.day() >= 18));

        let h2022 = nyse_holidays(2022);
        assert!(!h2022.contains(&ymd(2021, 12, 31)));
        assert!(h2022.contains(&ymd(2022, 6, 20)));
        assert!(h2022.contains(&ymd(2022, 4, 15)));

        let h2025 = nyse_holidays(2025);
        assert_eq!(h2025.len(), 10);
        for d in [
            ymd(2025, 1, 1),
            ymd(2025, 1, 20),
            ymd(2025, 2, 17),
            ymd(2025, 4, 18),
            ymd(2025, 5, 26),
            ymd(2025, 6, 19),
            ymd(2025, 7, 4),
            ymd(2025, 9, 1),
            ymd(2025, 11, 27),
            ymd(2025, 12, 25),
        ] {
            assert!(h2025.contains(&d), "{d} missing");
        }
    }
}

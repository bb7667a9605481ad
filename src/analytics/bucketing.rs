//! Calendar bucketing for analytics.
//!
//! Formats month keys (the `DATE_TRUNC('month', ..)` buckets the reports
//! group by) and computes whole-month and day offsets for cohort tracking.

use chrono::{Datelike, NaiveDate};

/// Format a date's month as `YYYY-MM`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Whole-month difference `to - from`, ignoring the day of month.
///
/// 2024-01-31 → 2024-02-01 is one month; 2024-03-15 → 2024-01-01 is -2.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let years = i64::from(to.year()) - i64::from(from.year());
    let months = i64::from(to.month()) - i64::from(from.month());
    years * 12 + months
}

/// Days from `earlier` to `later` (negative when reversed).
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

/// English month name for `1..=12`.
pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_key_format() {
        assert_eq!(month_key(ymd(2025, 6, 15)), "2025-06");
        assert_eq!(month_key(ymd(1999, 12, 31)), "1999-12");
    }

    #[test]
    fn months_between_ignores_day() {
        assert_eq!(months_between(ymd(2024, 1, 31), ymd(2024, 2, 1)), 1);
        assert_eq!(months_between(ymd(2024, 1, 1), ymd(2024, 1, 31)), 0);
        assert_eq!(months_between(ymd(2023, 11, 5), ymd(2024, 2, 5)), 3);
        assert_eq!(months_between(ymd(2024, 3, 15), ymd(2024, 1, 1)), -2);
    }

    #[test]
    fn days_between_signed() {
        assert_eq!(days_between(ymd(2024, 1, 1), ymd(2024, 3, 1)), 60);
        assert_eq!(days_between(ymd(2024, 3, 1), ymd(2024, 1, 1)), -60);
    }

    #[test]
    fn month_names() {
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(12), "December");
        assert_eq!(month_name(13), "Unknown");
    }
}

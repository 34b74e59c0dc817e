//! Federation year arithmetic

use chrono::{Datelike, NaiveDate};

/// Last day of `month` in `year`.
fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// End of the federation year that `today` belongs to: the last day of
/// `end_month`, rolled to the following year once that day is reached.
///
/// This is the default expiration of warning and suspension badges.
pub fn federation_year_end(today: NaiveDate, end_month: u32) -> NaiveDate {
    let candidate = last_day_of_month(today.year(), end_month);
    match candidate {
        Some(end) if today < end => end,
        _ => last_day_of_month(today.year() + 1, end_month).unwrap_or(NaiveDate::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_year_end_same_year() {
        assert_eq!(federation_year_end(d(2026, 3, 14), 9), d(2026, 9, 30));
    }

    #[test]
    fn test_year_end_rolls_over_on_last_day() {
        assert_eq!(federation_year_end(d(2026, 9, 30), 9), d(2027, 9, 30));
        assert_eq!(federation_year_end(d(2026, 11, 2), 9), d(2027, 9, 30));
    }

    #[test]
    fn test_year_end_december() {
        assert_eq!(federation_year_end(d(2026, 6, 1), 12), d(2026, 12, 31));
    }
}

//! Grouping of dated event records into monthly series.

use crate::gaps::ObservedSeries;
use crate::month::MonthKey;
use chrono::Datelike;

/// Count events per month. Each item is the date of one event (one ride).
pub fn count_by_month<D, I>(dates: I) -> ObservedSeries
where
    D: Datelike,
    I: IntoIterator<Item = D>,
{
    let mut counts = ObservedSeries::new();
    for date in dates {
        *counts.entry(MonthKey::from_date(&date)).or_insert(0.0) += 1.0;
    }
    counts
}

/// Sum values per month.
///
/// Non-finite values are skipped; a month whose values were all skipped is absent.
pub fn sum_by_month<D, I>(records: I) -> ObservedSeries
where
    D: Datelike,
    I: IntoIterator<Item = (D, f64)>,
{
    let mut sums = ObservedSeries::new();
    for (date, value) in records {
        if value.is_finite() {
            *sums.entry(MonthKey::from_date(&date)).or_insert(0.0) += value;
        }
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_count_by_month() {
        let dates = vec![
            date(2021, 3, 1),
            date(2021, 1, 31),
            date(2021, 3, 30),
            date(2021, 1, 2),
            date(2021, 3, 15),
        ];
        let counts = count_by_month(dates);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&MonthKey::new(2021, 1).unwrap()], 2.0);
        assert_eq!(counts[&MonthKey::new(2021, 3).unwrap()], 3.0);
    }

    #[test]
    fn test_count_accepts_datetimes() {
        let stamps: Vec<NaiveDateTime> = vec![
            date(2020, 12, 31).and_hms_opt(23, 59, 0).unwrap(),
            date(2021, 1, 1).and_hms_opt(0, 1, 0).unwrap(),
        ];
        let counts = count_by_month(stamps);
        assert_eq!(counts[&MonthKey::new(2020, 12).unwrap()], 1.0);
        assert_eq!(counts[&MonthKey::new(2021, 1).unwrap()], 1.0);
    }

    #[test]
    fn test_sum_by_month_skips_non_finite() {
        let records = vec![
            (date(2022, 5, 1), 2.5),
            (date(2022, 5, 20), 1.5),
            (date(2022, 6, 3), f64::NAN),
        ];
        let sums = sum_by_month(records);
        assert_eq!(sums.len(), 1);
        assert_eq!(sums[&MonthKey::new(2022, 5).unwrap()], 4.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(count_by_month(Vec::<NaiveDate>::new()).is_empty());
    }
}

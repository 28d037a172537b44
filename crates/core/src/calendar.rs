//! Calendar dates and date-range expansion.
//!
//! Requests carry dates as `YYYY-MM-DD`; the remote simulator and the event
//! stream use `DD-MM-YYYY`. A [`CalendarDate`] can only be built from a
//! (year, month, day) triple that survives calendar normalization unchanged,
//! so 30 February or 31 April never exist as values.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Composes a date, returning `None` when the triple is not a real day.
    #[must_use]
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        // from_ymd_opt already rejects overflow; the round-trip check keeps the
        // invariant explicit for every constructor path.
        (date.year() == year && date.month() == month && date.day() == day).then_some(Self(date))
    }

    /// Parses the request encoding `YYYY-MM-DD`.
    #[must_use]
    pub fn parse_iso(text: &str) -> Option<Self> {
        let mut parts = text.trim().splitn(3, '-');
        let year = parts.next()?.parse().ok()?;
        let month = parts.next()?.parse().ok()?;
        let day = parts.next()?.parse().ok()?;
        Self::new(year, month, day)
    }

    /// Parses the display encoding `DD-MM-YYYY`.
    #[must_use]
    pub fn parse_display(text: &str) -> Option<Self> {
        let mut parts = text.trim().splitn(3, '-');
        let day = parts.next()?.parse().ok()?;
        let month = parts.next()?.parse().ok()?;
        let year = parts.next()?.parse().ok()?;
        Self::new(year, month, day)
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// The following calendar day, if representable.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}-{}", self.day(), self.month(), self.year())
    }
}

/// Expands two `YYYY-MM-DD` bounds into the inclusive, ordered list of dates.
///
/// Returns an empty list when either bound is unparsable or `start > end`;
/// callers must report that as a validation failure.
#[must_use]
pub fn expand_range(start: &str, end: &str) -> Vec<CalendarDate> {
    let (Some(start), Some(end)) = (CalendarDate::parse_iso(start), CalendarDate::parse_iso(end))
    else {
        return Vec::new();
    };

    let mut dates = Vec::new();
    let mut current = Some(start);
    while let Some(date) = current.filter(|d| *d <= end) {
        // Re-validated from the display form.
        if let Some(valid) = CalendarDate::parse_display(&date.to_string()) {
            dates.push(valid);
        }
        current = date.next();
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(dates: &[CalendarDate]) -> Vec<String> {
        dates.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_rejects_non_existent_days() {
        assert!(CalendarDate::new(2023, 2, 29).is_none());
        assert!(CalendarDate::new(2024, 4, 31).is_none());
        assert!(CalendarDate::new(2024, 13, 1).is_none());
        assert!(CalendarDate::new(2024, 2, 29).is_some());
    }

    #[test]
    fn test_display_is_day_first() {
        let date = CalendarDate::new(2024, 3, 1).unwrap();
        assert_eq!(date.to_string(), "01-03-2024");
        assert_eq!(CalendarDate::parse_display("01-03-2024"), Some(date));
    }

    #[test]
    fn test_leap_year_range() {
        let dates = expand_range("2024-02-27", "2024-03-01");
        assert_eq!(
            names(&dates),
            vec!["27-02-2024", "28-02-2024", "29-02-2024", "01-03-2024"]
        );
    }

    #[test]
    fn test_non_leap_year_range_skips_to_march() {
        let dates = expand_range("2023-02-27", "2023-03-01");
        assert_eq!(names(&dates), vec!["27-02-2023", "28-02-2023", "01-03-2023"]);
    }

    #[test]
    fn test_year_boundary() {
        let dates = expand_range("2023-12-30", "2024-01-02");
        assert_eq!(
            names(&dates),
            vec!["30-12-2023", "31-12-2023", "01-01-2024", "02-01-2024"]
        );
    }

    #[test]
    fn test_single_day_range() {
        assert_eq!(names(&expand_range("2024-05-10", "2024-05-10")), vec!["10-05-2024"]);
    }

    #[test]
    fn test_length_matches_inclusive_day_count_and_is_increasing() {
        let dates = expand_range("2023-11-15", "2024-03-20");
        let start = NaiveDate::from_ymd_opt(2023, 11, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let expected = (end - start).num_days() + 1;
        assert_eq!(dates.len() as i64, expected);
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_reversed_range_is_empty() {
        assert!(expand_range("2024-03-02", "2024-03-01").is_empty());
    }

    #[test]
    fn test_unparsable_bounds_are_empty() {
        assert!(expand_range("not-a-date", "2024-03-01").is_empty());
        assert!(expand_range("2024-03-01", "").is_empty());
        assert!(expand_range("2024-02-30", "2024-03-01").is_empty());
    }
}

//! Recurrence patterns and next-occurrence evaluation.
//!
//! Evaluation is a pure function of the current occurrence and the pattern.
//! Weekdays are numbered from Sunday (0) to Saturday (6) and weeks start on
//! Sunday. When a monthly pattern pins a day that the target month does not
//! have, the occurrence is clamped to that month's last day.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SchedulingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::Daily => "daily",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::Yearly => "yearly",
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceType {
    type Err = SchedulingError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "daily" => Ok(RecurrenceType::Daily),
            "weekly" => Ok(RecurrenceType::Weekly),
            "monthly" => Ok(RecurrenceType::Monthly),
            "yearly" => Ok(RecurrenceType::Yearly),
            _ => Err(SchedulingError::InvalidPattern(format!(
                "'{}' is not a recurrence type; expected daily, weekly, monthly or yearly",
                value
            ))),
        }
    }
}

/// How a series repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    #[serde(rename = "type")]
    pub recurrence_type: RecurrenceType,
    /// Every `interval` units.
    pub interval: u32,
    /// Weekdays, 0 = Sunday. Only used by weekly patterns.
    #[serde(default)]
    pub days_of_week: BTreeSet<u8>,
    /// Only used by monthly patterns.
    pub day_of_month: Option<u32>,
    /// No occurrence may start after this moment.
    pub end_date: Option<NaiveDateTime>,
    pub max_occurrences: Option<u32>,
}

impl RecurrencePattern {
    pub fn new(recurrence_type: RecurrenceType, interval: u32) -> Self {
        RecurrencePattern {
            recurrence_type,
            interval,
            days_of_week: BTreeSet::new(),
            day_of_month: None,
            end_date: None,
            max_occurrences: None,
        }
    }

    pub fn daily(interval: u32) -> Self {
        Self::new(RecurrenceType::Daily, interval)
    }

    pub fn weekly(interval: u32) -> Self {
        Self::new(RecurrenceType::Weekly, interval)
    }

    pub fn monthly(interval: u32) -> Self {
        Self::new(RecurrenceType::Monthly, interval)
    }

    pub fn yearly(interval: u32) -> Self {
        Self::new(RecurrenceType::Yearly, interval)
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        self.days_of_week = days.into_iter().collect();
        self
    }

    pub fn on_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn until(mut self, end_date: NaiveDateTime) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn limit(mut self, max_occurrences: u32) -> Self {
        self.max_occurrences = Some(max_occurrences);
        self
    }

    /// Reject pattern shapes that cannot be evaluated.
    pub fn validate(&self) -> Result<()> {
        if self.interval < 1 {
            return Err(SchedulingError::InvalidPattern(
                "interval must be at least 1".to_string(),
            ));
        }
        if let Some(day) = self.days_of_week.iter().find(|day| **day > 6) {
            return Err(SchedulingError::InvalidPattern(format!(
                "weekday {} is outside 0 (Sunday) to 6 (Saturday)",
                day
            )));
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(SchedulingError::InvalidPattern(format!(
                    "day of month {} is outside 1 to 31",
                    day
                )));
            }
        }
        if self.max_occurrences == Some(0) {
            return Err(SchedulingError::InvalidPattern(
                "max occurrences must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether an occurrence starting at `start` is still inside the pattern's end date.
    pub fn admits(&self, start: NaiveDateTime) -> bool {
        self.end_date.map_or(true, |end_date| start <= end_date)
    }
}

/// Compute the occurrence that follows `current`.
///
/// The result always lies strictly after `current` and keeps its time of day.
pub fn next_occurrence(current: NaiveDateTime, pattern: &RecurrencePattern) -> Result<NaiveDateTime> {
    pattern.validate()?;

    let next = match pattern.recurrence_type {
        RecurrenceType::Daily => current.checked_add_days(Days::new(u64::from(pattern.interval))),
        RecurrenceType::Weekly => next_weekly(current, pattern.interval, &pattern.days_of_week),
        RecurrenceType::Monthly => next_monthly(current, pattern.interval, pattern.day_of_month),
        RecurrenceType::Yearly => pattern
            .interval
            .checked_mul(12)
            .and_then(|months| current.checked_add_months(Months::new(months))),
    }
    .ok_or(SchedulingError::DateOutOfRange)?;

    debug!(
        pattern = %pattern.recurrence_type,
        interval = pattern.interval,
        %current,
        %next,
        "evaluated next occurrence"
    );
    Ok(next)
}

fn next_weekly(current: NaiveDateTime, interval: u32, days: &BTreeSet<u8>) -> Option<NaiveDateTime> {
    let Some(&earliest) = days.iter().next() else {
        return current.checked_add_days(Days::new(7 * u64::from(interval)));
    };

    let today = current.weekday().num_days_from_sunday() as u8;
    if let Some(&later) = days.range(today + 1..).next() {
        return current.checked_add_days(Days::new(u64::from(later - today)));
    }

    // Back to this week's Sunday, forward `interval` weeks, then to the earliest day.
    let offset = 7 * u64::from(interval) - u64::from(today) + u64::from(earliest);
    current.checked_add_days(Days::new(offset))
}

fn next_monthly(current: NaiveDateTime, interval: u32, day_of_month: Option<u32>) -> Option<NaiveDateTime> {
    let shifted = current.checked_add_months(Months::new(interval))?;
    match day_of_month {
        None => Some(shifted),
        Some(day) => shifted.with_day(day.min(days_in_month(shifted.year(), shifted.month()))),
    }
}

pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn daily_adds_interval_days() {
        let next = next_occurrence(at(2024, 1, 1, 9), &RecurrencePattern::daily(1)).unwrap();
        assert_eq!(next, at(2024, 1, 2, 9));
        let next = next_occurrence(at(2024, 1, 30, 9), &RecurrencePattern::daily(3)).unwrap();
        assert_eq!(next, at(2024, 2, 2, 9));
    }

    #[test]
    fn weekly_walks_selected_days_then_wraps() {
        // 2024-01-01 is a Monday.
        let pattern = RecurrencePattern::weekly(1).on_days([1, 3]);
        let wednesday = next_occurrence(at(2024, 1, 1, 9), &pattern).unwrap();
        assert_eq!(wednesday, at(2024, 1, 3, 9));
        let monday = next_occurrence(wednesday, &pattern).unwrap();
        assert_eq!(monday, at(2024, 1, 8, 9));
    }

    #[test]
    fn weekly_wrap_honours_interval() {
        let pattern = RecurrencePattern::weekly(2).on_days([1, 5]);
        // Friday 2024-01-05 wraps to Monday two weeks on.
        let next = next_occurrence(at(2024, 1, 5, 14), &pattern).unwrap();
        assert_eq!(next, at(2024, 1, 15, 14));
    }

    #[test]
    fn weekly_wrap_from_saturday_to_sunday() {
        let pattern = RecurrencePattern::weekly(1).on_days([0, 6]);
        // Saturday 2024-01-06 -> Sunday 2024-01-07.
        let next = next_occurrence(at(2024, 1, 6, 10), &pattern).unwrap();
        assert_eq!(next, at(2024, 1, 7, 10));
        let next = next_occurrence(next, &pattern).unwrap();
        assert_eq!(next, at(2024, 1, 13, 10));
    }

    #[test]
    fn weekly_without_days_adds_whole_weeks() {
        let next = next_occurrence(at(2024, 1, 3, 9), &RecurrencePattern::weekly(2)).unwrap();
        assert_eq!(next, at(2024, 1, 17, 9));
    }

    #[test]
    fn monthly_pins_and_clamps_day() {
        let pattern = RecurrencePattern::monthly(1).on_day_of_month(31);
        let feb = next_occurrence(at(2024, 1, 31, 9), &pattern).unwrap();
        assert_eq!(feb, at(2024, 2, 29, 9));
        let mar = next_occurrence(feb, &pattern).unwrap();
        assert_eq!(mar, at(2024, 3, 31, 9));
        let apr = next_occurrence(mar, &pattern).unwrap();
        assert_eq!(apr, at(2024, 4, 30, 9));
    }

    #[test]
    fn monthly_pin_moves_day_within_target_month() {
        let pattern = RecurrencePattern::monthly(2).on_day_of_month(15);
        let next = next_occurrence(at(2024, 1, 3, 9), &pattern).unwrap();
        assert_eq!(next, at(2024, 3, 15, 9));
    }

    #[test]
    fn yearly_clamps_leap_day() {
        let next = next_occurrence(at(2024, 2, 29, 9), &RecurrencePattern::yearly(1)).unwrap();
        assert_eq!(next, at(2025, 2, 28, 9));
        let next = next_occurrence(at(2024, 6, 1, 9), &RecurrencePattern::yearly(4)).unwrap();
        assert_eq!(next, at(2028, 6, 1, 9));
    }

    #[test]
    fn next_is_strictly_after_current() {
        let patterns = vec![
            RecurrencePattern::daily(1),
            RecurrencePattern::weekly(1),
            RecurrencePattern::weekly(1).on_days([0]),
            RecurrencePattern::weekly(3).on_days([0, 2, 4, 6]),
            RecurrencePattern::monthly(1),
            RecurrencePattern::monthly(1).on_day_of_month(1),
            RecurrencePattern::monthly(1).on_day_of_month(31),
            RecurrencePattern::yearly(1),
        ];
        let mut start = at(2024, 1, 1, 8);
        for offset in 0..40 {
            for pattern in &patterns {
                let next = next_occurrence(start, pattern).unwrap();
                assert!(next > start, "{:?} from {} gave {}", pattern, start, next);
            }
            start = at(2024, 1, 1, 8) + chrono::Duration::days(offset * 9);
        }
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        let start = at(2024, 1, 1, 9);
        assert!(matches!(
            next_occurrence(start, &RecurrencePattern::daily(0)),
            Err(SchedulingError::InvalidPattern(_))
        ));
        assert!(matches!(
            next_occurrence(start, &RecurrencePattern::weekly(1).on_days([7])),
            Err(SchedulingError::InvalidPattern(_))
        ));
        assert!(matches!(
            next_occurrence(start, &RecurrencePattern::monthly(1).on_day_of_month(32)),
            Err(SchedulingError::InvalidPattern(_))
        ));
        assert!(RecurrencePattern::daily(1).limit(0).validate().is_err());
        assert!(matches!(
            "fortnightly".parse::<RecurrenceType>(),
            Err(SchedulingError::InvalidPattern(_))
        ));
        assert_eq!("Weekly".parse::<RecurrenceType>().unwrap(), RecurrenceType::Weekly);
    }

    #[test]
    fn end_date_is_inclusive() {
        let pattern = RecurrencePattern::daily(1).until(at(2024, 1, 4, 9));
        assert!(pattern.admits(at(2024, 1, 4, 9)));
        assert!(!pattern.admits(at(2024, 1, 5, 9)));
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 4), 30);
    }
}

//! Series generation.
//!
//! Expands a base appointment and a recurrence pattern into concrete drafts.
//! Nothing is persisted here; see [`Scheduler::book_series`](crate::Scheduler::book_series).

use chrono::{Datelike, NaiveDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::models::AppointmentDraft;
use crate::recurrence::{next_occurrence, RecurrencePattern, RecurrenceType};

pub struct SeriesGenerator;

impl SeriesGenerator {
    /// Produce up to `count` instances of `base` following `pattern`.
    ///
    /// `pattern.max_occurrences` caps `count`, and generation stops at the first
    /// candidate starting after `pattern.end_date`. Every instance keeps the
    /// base's duration and fields and shares one series id.
    pub fn generate(
        base: &AppointmentDraft,
        pattern: &RecurrencePattern,
        count: usize,
    ) -> Result<Vec<AppointmentDraft>> {
        if base.end_time <= base.start_time {
            return Err(SchedulingError::InvalidBase(
                "start time must be before end time".to_string(),
            ));
        }
        pattern.validate()?;

        let effective = pattern
            .max_occurrences
            .map_or(count, |cap| count.min(cap as usize));
        let duration = base.duration();
        let series_id = base.series_id.unwrap_or_else(Uuid::new_v4);
        let stepping = anchored(pattern, base.start_time);

        let mut instances = Vec::new();
        let mut cursor = base.start_time;
        while instances.len() < effective {
            if !pattern.admits(cursor) {
                break;
            }

            let mut instance = base.clone();
            instance.start_time = cursor;
            instance.end_time = cursor
                .checked_add_signed(duration)
                .ok_or(SchedulingError::DateOutOfRange)?;
            instance.series_id = Some(series_id);
            instance.recurrence_pattern = Some(pattern.clone());
            instances.push(instance);

            if instances.len() < effective {
                cursor = next_occurrence(cursor, &stepping)?;
            }
        }

        debug!(
            %series_id,
            requested = count,
            generated = instances.len(),
            "generated series instances"
        );
        Ok(instances)
    }
}

/// Monthly series without a pinned day stay on the base's day after short months.
fn anchored(pattern: &RecurrencePattern, start: NaiveDateTime) -> RecurrencePattern {
    let mut stepping = pattern.clone();
    if stepping.recurrence_type == RecurrenceType::Monthly && stepping.day_of_month.is_none() {
        stepping.day_of_month = Some(start.day());
    }
    stepping
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn base() -> AppointmentDraft {
        AppointmentDraft::new("Physiotherapy", "P042", at(2024, 1, 1, 9), at(2024, 1, 1, 10))
            .unwrap()
            .with_location("Room 2")
    }

    #[test]
    fn daily_series_keeps_duration_and_fields() {
        let instances = SeriesGenerator::generate(&base(), &RecurrencePattern::daily(1), 3).unwrap();
        let starts: Vec<_> = instances.iter().map(|i| i.start_time).collect();
        assert_eq!(
            starts,
            vec![at(2024, 1, 1, 9), at(2024, 1, 2, 9), at(2024, 1, 3, 9)]
        );
        for instance in &instances {
            assert_eq!(instance.duration(), Duration::hours(1));
            assert_eq!(instance.location.as_deref(), Some("Room 2"));
            assert_eq!(instance.series_id, instances[0].series_id);
            assert_eq!(
                instance.recurrence_pattern.as_ref(),
                Some(&RecurrencePattern::daily(1))
            );
        }
        assert!(instances[0].series_id.is_some());
    }

    #[test]
    fn max_occurrences_caps_count() {
        let pattern = RecurrencePattern::weekly(1).limit(2);
        assert_eq!(SeriesGenerator::generate(&base(), &pattern, 10).unwrap().len(), 2);
        assert_eq!(SeriesGenerator::generate(&base(), &pattern, 1).unwrap().len(), 1);
    }

    #[test]
    fn end_date_stops_generation_inclusively() {
        let pattern = RecurrencePattern::daily(1).until(at(2024, 1, 4, 9));
        let instances = SeriesGenerator::generate(&base(), &pattern, 10).unwrap();
        assert_eq!(instances.len(), 4);
        assert_eq!(instances.last().unwrap().start_time, at(2024, 1, 4, 9));
    }

    #[test]
    fn unbounded_count_stops_at_end_date() {
        let pattern = RecurrencePattern::daily(1).until(at(2024, 1, 3, 9));
        let instances = SeriesGenerator::generate(&base(), &pattern, usize::MAX).unwrap();
        let starts: Vec<_> = instances.iter().map(|i| i.start_time).collect();
        assert_eq!(
            starts,
            vec![at(2024, 1, 1, 9), at(2024, 1, 2, 9), at(2024, 1, 3, 9)]
        );
    }

    #[test]
    fn zero_count_generates_nothing() {
        assert!(SeriesGenerator::generate(&base(), &RecurrencePattern::daily(1), 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rejects_backwards_base() {
        let mut broken = base();
        broken.end_time = broken.start_time;
        assert!(matches!(
            SeriesGenerator::generate(&broken, &RecurrencePattern::daily(1), 3),
            Err(SchedulingError::InvalidBase(_))
        ));
    }

    #[test]
    fn rejects_invalid_pattern() {
        assert!(matches!(
            SeriesGenerator::generate(&base(), &RecurrencePattern::daily(0), 3),
            Err(SchedulingError::InvalidPattern(_))
        ));
    }

    #[test]
    fn keeps_existing_series_id() {
        let series_id = Uuid::new_v4();
        let mut seeded = base();
        seeded.series_id = Some(series_id);
        let instances = SeriesGenerator::generate(&seeded, &RecurrencePattern::daily(2), 3).unwrap();
        assert!(instances.iter().all(|i| i.series_id == Some(series_id)));
    }

    #[test]
    fn monthly_series_returns_to_anchor_day() {
        let mut end_of_month = base();
        end_of_month.start_time = at(2024, 1, 31, 9);
        end_of_month.end_time = at(2024, 1, 31, 10);
        let instances =
            SeriesGenerator::generate(&end_of_month, &RecurrencePattern::monthly(1), 4).unwrap();
        let starts: Vec<_> = instances.iter().map(|i| i.start_time).collect();
        assert_eq!(
            starts,
            vec![
                at(2024, 1, 31, 9),
                at(2024, 2, 29, 9),
                at(2024, 3, 31, 9),
                at(2024, 4, 30, 9)
            ]
        );
        // The stored pattern is the caller's, not the anchored copy.
        assert_eq!(instances[1].recurrence_pattern, Some(RecurrencePattern::monthly(1)));
    }

    #[test]
    fn starts_strictly_increase() {
        let pattern = RecurrencePattern::weekly(1).on_days([1, 3, 5]);
        let instances = SeriesGenerator::generate(&base(), &pattern, 12).unwrap();
        assert_eq!(instances.len(), 12);
        assert!(instances
            .windows(2)
            .all(|pair| pair[0].start_time < pair[1].start_time));
    }
}

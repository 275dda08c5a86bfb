//! Open-slot search within business hours.

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::debug;

use crate::config::{BusinessHours, SlotOverflow};
use crate::conflict::ConflictDetector;
use crate::error::{Result, SchedulingError};
use crate::models::TimeSlot;
use crate::store::RecordStore;

pub struct AvailabilityFinder<'a, S: RecordStore + ?Sized> {
    detector: ConflictDetector<'a, S>,
    hours: BusinessHours,
}

impl<'a, S: RecordStore + ?Sized> AvailabilityFinder<'a, S> {
    pub fn new(store: &'a S, hours: BusinessHours) -> Self {
        AvailabilityFinder {
            detector: ConflictDetector::new(store),
            hours,
        }
    }

    pub fn business_hours(&self) -> &BusinessHours {
        &self.hours
    }

    /// Every candidate slot on `date`, booked or not, in start order.
    ///
    /// Candidates start at opening time and every `slot_step_minutes` after it
    /// while the start is before closing time.
    pub fn candidate_slots(&self, date: NaiveDate, duration_minutes: i64) -> Result<Vec<TimeSlot>> {
        if duration_minutes <= 0 {
            return Err(SchedulingError::InvalidSlotDuration(duration_minutes));
        }

        let midnight = date.and_time(NaiveTime::MIN);
        let open = midnight + Duration::hours(i64::from(self.hours.open_hour));
        let close = midnight + Duration::hours(i64::from(self.hours.close_hour));
        let duration = Duration::try_minutes(duration_minutes)
            .ok_or(SchedulingError::InvalidSlotDuration(duration_minutes))?;
        let step = Duration::minutes(i64::from(self.hours.slot_step_minutes.max(1)));
        let exclude = self.hours.overflow == SlotOverflow::Exclude;

        let mut slots = Vec::new();
        let mut current = open;
        while current < close {
            // An end past the calendar range is past closing time too.
            let slot_end = match current.checked_add_signed(duration) {
                Some(end) => end,
                None if exclude => break,
                None => return Err(SchedulingError::DateOutOfRange),
            };
            if slot_end > close && exclude {
                break;
            }
            slots.push(TimeSlot::new(current, slot_end)?);
            current = current
                .checked_add_signed(step)
                .ok_or(SchedulingError::DateOutOfRange)?;
        }
        Ok(slots)
    }

    /// Conflict-free slots of `duration_minutes` on `date`.
    ///
    /// Stateless: the same arguments against an unchanged store give the same answer.
    pub fn find_open_slots(&self, date: NaiveDate, duration_minutes: i64) -> Result<Vec<TimeSlot>> {
        let candidates = self.candidate_slots(date, duration_minutes)?;
        let total = candidates.len();

        let mut open = Vec::with_capacity(total);
        for slot in candidates {
            if !self.detector.has_conflict(slot.start, slot.end, None)? {
                open.push(slot);
            }
        }

        debug!(%date, duration_minutes, candidates = total, open = open.len(), "searched open slots");
        Ok(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentDraft;
    use crate::store::InMemoryStore;
    use chrono::NaiveDateTime;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        day().and_hms_opt(hour, minute, 0).unwrap()
    }

    fn starts(slots: &[TimeSlot]) -> Vec<NaiveDateTime> {
        slots.iter().map(|s| s.start).collect()
    }

    #[test]
    fn empty_day_offers_every_hour() {
        let store = InMemoryStore::new();
        let finder = AvailabilityFinder::new(&store, BusinessHours::default());
        let slots = finder.find_open_slots(day(), 60).unwrap();
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0], TimeSlot::new(at(9, 0), at(10, 0)).unwrap());
        assert_eq!(slots[7], TimeSlot::new(at(16, 0), at(17, 0)).unwrap());
    }

    #[test]
    fn booked_hours_are_removed() {
        let store = InMemoryStore::new();
        store
            .insert(AppointmentDraft::new("Surgery", "P009", at(10, 30), at(12, 0)).unwrap())
            .unwrap();
        let finder = AvailabilityFinder::new(&store, BusinessHours::default());
        let slots = finder.find_open_slots(day(), 60).unwrap();
        assert_eq!(
            starts(&slots),
            vec![at(9, 0), at(12, 0), at(13, 0), at(14, 0), at(15, 0), at(16, 0)]
        );
    }

    #[test]
    fn overflowing_slots_excluded_by_default() {
        let store = InMemoryStore::new();
        let finder = AvailabilityFinder::new(&store, BusinessHours::default());
        let slots = finder.find_open_slots(day(), 90).unwrap();
        assert_eq!(slots.last().unwrap().start, at(15, 0));
        assert!(slots.iter().all(|s| s.end <= at(17, 0)));
    }

    #[test]
    fn overflowing_slots_offered_when_included() {
        let store = InMemoryStore::new();
        let hours = BusinessHours {
            overflow: SlotOverflow::Include,
            ..BusinessHours::default()
        };
        let finder = AvailabilityFinder::new(&store, hours);
        let slots = finder.find_open_slots(day(), 90).unwrap();
        assert_eq!(slots.len(), 8);
        assert_eq!(slots.last().unwrap().end, at(17, 30));
    }

    #[test]
    fn step_controls_granularity() {
        let store = InMemoryStore::new();
        let hours = BusinessHours {
            open_hour: 9,
            close_hour: 11,
            slot_step_minutes: 30,
            overflow: SlotOverflow::Exclude,
        };
        let finder = AvailabilityFinder::new(&store, hours);
        let slots = finder.candidate_slots(day(), 30).unwrap();
        assert_eq!(
            starts(&slots),
            vec![at(9, 0), at(9, 30), at(10, 0), at(10, 30)]
        );
    }

    #[test]
    fn repeated_searches_agree() {
        let store = InMemoryStore::new();
        store
            .insert(AppointmentDraft::new("Review", "P003", at(13, 0), at(14, 0)).unwrap())
            .unwrap();
        let finder = AvailabilityFinder::new(&store, BusinessHours::default());
        let first = finder.find_open_slots(day(), 45).unwrap();
        let second = finder.find_open_slots(day(), 45).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_non_positive_duration() {
        let store = InMemoryStore::new();
        let finder = AvailabilityFinder::new(&store, BusinessHours::default());
        assert!(matches!(
            finder.find_open_slots(day(), 0),
            Err(SchedulingError::InvalidSlotDuration(0))
        ));
    }

    #[test]
    fn huge_durations_are_errors_not_panics() {
        let store = InMemoryStore::new();
        let finder = AvailabilityFinder::new(&store, BusinessHours::default());
        assert!(matches!(
            finder.find_open_slots(day(), i64::MAX),
            Err(SchedulingError::InvalidSlotDuration(i64::MAX))
        ));

        // Representable as a duration, but ends beyond the last supported date.
        let past_calendar = i64::MAX / 60_000;
        assert!(finder.find_open_slots(day(), past_calendar).unwrap().is_empty());

        let hours = BusinessHours {
            overflow: SlotOverflow::Include,
            ..BusinessHours::default()
        };
        let including = AvailabilityFinder::new(&store, hours);
        assert!(matches!(
            including.find_open_slots(day(), past_calendar),
            Err(SchedulingError::DateOutOfRange)
        ));
    }

    #[test]
    fn longer_than_business_day_yields_nothing_when_excluded() {
        let store = InMemoryStore::new();
        let finder = AvailabilityFinder::new(&store, BusinessHours::default());
        assert!(finder.find_open_slots(day(), 9 * 60).unwrap().is_empty());
    }
}

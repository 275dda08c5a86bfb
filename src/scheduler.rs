//! Scheduling facade.
//!
//! [`Scheduler`] bundles the record store and configuration and exposes the
//! whole public contract: recurrence evaluation, series generation, conflict
//! checks, open-slot search, series mutation and booking.
//!
//! Booking is check-then-insert. Two callers booking the same interval at the
//! same time can both pass the check, so the conflict answer is advisory until
//! the record store enforces it. Series booking persists one instance at a
//! time and never rolls back; the report says what was created.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::AvailabilityFinder;
use crate::config::SchedulerConfig;
use crate::conflict::ConflictDetector;
use crate::error::{Result, SchedulingError};
use crate::models::{Appointment, AppointmentDraft, AppointmentStatus, AppointmentUpdate, SeriesUpdate, TimeSlot};
use crate::mutator::{ExceptionKind, ExceptionOutcome, SeriesMutator};
use crate::recurrence::{self, RecurrencePattern};
use crate::series::SeriesGenerator;
use crate::store::RecordStore;

/// What to do with a series instance that overlaps an existing appointment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Leave the instance out and report it as skipped.
    #[default]
    Skip,
    /// Insert it anyway.
    Ignore,
}

/// A series instance the store did not accept.
#[derive(Debug)]
pub struct FailedInstance {
    pub draft: AppointmentDraft,
    pub error: SchedulingError,
}

/// Result of persisting a generated series.
#[derive(Debug, Default)]
pub struct SeriesBookingReport {
    pub created: Vec<Appointment>,
    pub skipped: Vec<AppointmentDraft>,
    pub failed: Vec<FailedInstance>,
    pub total_requested: usize,
}

impl SeriesBookingReport {
    /// Calculate the success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total_requested == 0 {
            return 0.0;
        }
        (self.created.len() as f64 / self.total_requested as f64) * 100.0
    }

    /// True when every requested instance was created.
    pub fn is_complete(&self) -> bool {
        self.created.len() == self.total_requested
    }

    pub fn series_id(&self) -> Option<Uuid> {
        self.created.first().and_then(|a| a.series_id)
    }
}

pub struct Scheduler<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    config: SchedulerConfig,
}

impl<'a, S: RecordStore + ?Sized> Scheduler<'a, S> {
    pub fn new(store: &'a S, config: SchedulerConfig) -> Self {
        Scheduler { store, config }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn next_occurrence(
        &self,
        current: NaiveDateTime,
        pattern: &RecurrencePattern,
    ) -> Result<NaiveDateTime> {
        recurrence::next_occurrence(current, pattern)
    }

    pub fn generate(
        &self,
        base: &AppointmentDraft,
        pattern: &RecurrencePattern,
        count: usize,
    ) -> Result<Vec<AppointmentDraft>> {
        SeriesGenerator::generate(base, pattern, count)
    }

    pub fn has_conflict(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_id: Option<Uuid>,
    ) -> Result<bool> {
        ConflictDetector::new(self.store).has_conflict(start, end, exclude_id)
    }

    pub fn conflicts(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>> {
        ConflictDetector::new(self.store).conflicts(start, end, exclude_id)
    }

    pub fn find_open_slots(&self, date: NaiveDate, duration_minutes: i64) -> Result<Vec<TimeSlot>> {
        AvailabilityFinder::new(self.store, self.config.business_hours.clone())
            .find_open_slots(date, duration_minutes)
    }

    pub fn update_from_date(
        &self,
        series_id: Uuid,
        from_date: NaiveDateTime,
        update: &SeriesUpdate,
    ) -> Result<usize> {
        SeriesMutator::new(self.store).update_from_date(series_id, from_date, update)
    }

    pub fn cancel_from_date(
        &self,
        series_id: Uuid,
        from_date: NaiveDateTime,
        reason: Option<String>,
    ) -> Result<usize> {
        SeriesMutator::new(self.store).cancel_from_date(series_id, from_date, reason)
    }

    pub fn create_exception(
        &self,
        series_id: Uuid,
        original_date: NaiveDateTime,
        kind: ExceptionKind,
        reason: Option<String>,
    ) -> Result<ExceptionOutcome> {
        SeriesMutator::new(self.store).create_exception(series_id, original_date, kind, reason)
    }

    /// Book a single appointment if its interval is free.
    pub fn book(&self, draft: AppointmentDraft) -> Result<Appointment> {
        draft.validate()?;

        let conflicts = self.conflicts(draft.start_time, draft.end_time, None)?;
        if !conflicts.is_empty() {
            warn!(
                start = %draft.start_time,
                end = %draft.end_time,
                conflicts = conflicts.len(),
                "booking rejected"
            );
            return Err(SchedulingError::Conflict {
                count: conflicts.len(),
            });
        }

        let appointment = self.store.insert(draft)?;
        info!(id = %appointment.id, start = %appointment.start_time, "booked appointment");
        Ok(appointment)
    }

    /// Persist generated instances one by one.
    pub fn book_series(
        &self,
        drafts: Vec<AppointmentDraft>,
        policy: ConflictPolicy,
    ) -> SeriesBookingReport {
        let mut report = SeriesBookingReport {
            total_requested: drafts.len(),
            ..Default::default()
        };

        for draft in drafts {
            if policy == ConflictPolicy::Skip {
                match self.has_conflict(draft.start_time, draft.end_time, None) {
                    Ok(false) => {}
                    Ok(true) => {
                        report.skipped.push(draft);
                        continue;
                    }
                    Err(error) => {
                        report.failed.push(FailedInstance { draft, error });
                        continue;
                    }
                }
            }

            match self.store.insert(draft.clone()) {
                Ok(appointment) => report.created.push(appointment),
                Err(error) => report.failed.push(FailedInstance {
                    draft,
                    error: error.into(),
                }),
            }
        }

        if report.is_complete() {
            info!(
                series_id = ?report.series_id(),
                created = report.created.len(),
                "booked series"
            );
        } else {
            warn!(
                series_id = ?report.series_id(),
                created = report.created.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "series booked partially"
            );
        }
        report
    }

    /// Generate a series from `base` and book it.
    pub fn schedule_series(
        &self,
        base: &AppointmentDraft,
        pattern: &RecurrencePattern,
        count: usize,
        policy: ConflictPolicy,
    ) -> Result<SeriesBookingReport> {
        let drafts = self.generate(base, pattern, count)?;
        Ok(self.book_series(drafts, policy))
    }

    /// Move one appointment to a new interval if nothing else occupies it.
    pub fn reschedule(
        &self,
        appointment: &Appointment,
        new_start: NaiveDateTime,
        new_end: NaiveDateTime,
    ) -> Result<Appointment> {
        let conflicts = self.conflicts(new_start, new_end, Some(appointment.id))?;
        if !conflicts.is_empty() {
            return Err(SchedulingError::Conflict {
                count: conflicts.len(),
            });
        }
        let moved = self
            .store
            .update_by_id(appointment.id, &AppointmentUpdate::reschedule(new_start, new_end))?;
        info!(id = %moved.id, start = %moved.start_time, "rescheduled appointment");
        Ok(moved)
    }

    /// Move one appointment to `next` if the state machine allows it.
    pub fn set_status(&self, appointment: &Appointment, next: AppointmentStatus) -> Result<Appointment> {
        let next = appointment.status.transition_to(next).map_err(|err| {
            warn!(id = %appointment.id, from = %appointment.status, to = %next, "rejected status change");
            err
        })?;
        let updated = self
            .store
            .update_by_id(appointment.id, &SeriesUpdate::status(next).into())?;
        info!(id = %updated.id, status = %updated.status, "changed appointment status");
        Ok(updated)
    }
}

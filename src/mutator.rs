//! Bulk and single-instance changes to an existing series.
//!
//! None of these operations is transactional: each record store call can fail
//! on its own and earlier writes are not undone.

use chrono::NaiveDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::models::{
    validate_interval, Appointment, AppointmentException, AppointmentStatus, AppointmentUpdate,
    ExceptionType, SeriesUpdate,
};
use crate::store::{RecordStore, SeriesWindow};

/// The deviation to apply to one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExceptionKind {
    Cancelled,
    Rescheduled {
        new_start: NaiveDateTime,
        new_end: NaiveDateTime,
    },
    /// Arbitrary field changes. An empty update only records the exception.
    Modified(AppointmentUpdate),
}

impl ExceptionKind {
    pub fn exception_type(&self) -> ExceptionType {
        match self {
            ExceptionKind::Cancelled => ExceptionType::Cancelled,
            ExceptionKind::Rescheduled { .. } => ExceptionType::Rescheduled,
            ExceptionKind::Modified(_) => ExceptionType::Modified,
        }
    }
}

/// Result of [`SeriesMutator::create_exception`].
#[derive(Debug, Clone)]
pub struct ExceptionOutcome {
    pub exception: AppointmentException,
    /// The instance as it stands after the change.
    pub appointment: Appointment,
}

pub struct SeriesMutator<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> SeriesMutator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        SeriesMutator { store }
    }

    /// Apply `update` to every instance starting at or after `from_date`.
    ///
    /// Earlier instances are untouched. When the update changes the status, only
    /// instances allowed to make that transition are changed. Returns the number
    /// of instances updated.
    pub fn update_from_date(
        &self,
        series_id: Uuid,
        from_date: NaiveDateTime,
        update: &SeriesUpdate,
    ) -> Result<usize> {
        if update.is_empty() {
            return Err(SchedulingError::MissingField("update"));
        }
        update.validate()?;

        let mut window = SeriesWindow::new(series_id, from_date);
        if let Some(status) = update.status {
            let sources = AppointmentStatus::sources_of(status);
            if sources.is_empty() {
                warn!(%series_id, to = %status, "no instance may move to this status");
            }
            window = window.with_statuses(sources);
        }

        let changed = self.store.update_where(&window, update)?;
        info!(%series_id, %from_date, changed, "updated series going forward");
        Ok(changed)
    }

    /// Cancel every open instance starting at or after `from_date`.
    pub fn cancel_from_date(
        &self,
        series_id: Uuid,
        from_date: NaiveDateTime,
        reason: Option<String>,
    ) -> Result<usize> {
        let update = SeriesUpdate {
            status: Some(AppointmentStatus::Cancelled),
            cancellation_reason: reason,
            ..Default::default()
        };
        self.update_from_date(series_id, from_date, &update)
    }

    /// Record an exception for the instance starting at `original_date` and apply it.
    pub fn create_exception(
        &self,
        series_id: Uuid,
        original_date: NaiveDateTime,
        kind: ExceptionKind,
        reason: Option<String>,
    ) -> Result<ExceptionOutcome> {
        if let ExceptionKind::Rescheduled { new_start, new_end } = &kind {
            validate_interval(*new_start, *new_end)?;
        }

        let instance = self
            .store
            .find_series_instance(series_id, original_date)?
            .ok_or(SchedulingError::InstanceNotFound {
                series_id,
                original_date,
            })?;

        let change = self.instance_change(&instance, &kind, reason.clone())?;

        let moved = change
            .as_ref()
            .filter(|(update, _)| update.start_time.is_some() || update.end_time.is_some())
            .map(|(_, preview)| (preview.start_time, preview.end_time));
        let exception = match moved {
            Some((new_start, new_end)) => AppointmentException {
                exception_type: kind.exception_type(),
                ..AppointmentException::rescheduled(series_id, original_date, new_start, new_end, reason)
            },
            None => AppointmentException::new(series_id, original_date, kind.exception_type(), reason),
        };
        let exception = self.store.insert_exception(exception)?;

        let appointment = match change {
            Some((update, _)) => self.store.update_by_id(instance.id, &update)?,
            None => instance,
        };

        info!(
            %series_id,
            %original_date,
            kind = %exception.exception_type,
            appointment_id = %appointment.id,
            "applied series exception"
        );
        Ok(ExceptionOutcome {
            exception,
            appointment,
        })
    }

    /// Validate `kind` against the instance and build the update it implies,
    /// together with the instance as it would look afterwards.
    fn instance_change(
        &self,
        instance: &Appointment,
        kind: &ExceptionKind,
        reason: Option<String>,
    ) -> Result<Option<(AppointmentUpdate, Appointment)>> {
        let update = match kind {
            ExceptionKind::Cancelled => AppointmentUpdate::from(SeriesUpdate {
                status: Some(AppointmentStatus::Cancelled),
                cancellation_reason: reason,
                ..Default::default()
            }),
            ExceptionKind::Rescheduled { new_start, new_end } => {
                AppointmentUpdate::reschedule(*new_start, *new_end)
            }
            ExceptionKind::Modified(update) if update.is_empty() => return Ok(None),
            ExceptionKind::Modified(update) => {
                update.fields.validate()?;
                update.clone()
            }
        };

        if let Some(next) = update.fields.status {
            if let Err(err) = instance.status.transition_to(next) {
                warn!(appointment_id = %instance.id, from = %instance.status, to = %next, "rejected status change");
                return Err(err);
            }
        }

        let mut preview = instance.clone();
        update.apply_to(&mut preview)?;
        Ok(Some((update, preview)))
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::{RecordStore, SeriesWindow};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Appointment, AppointmentDraft, AppointmentException, AppointmentStatus, AppointmentUpdate,
    SeriesUpdate,
};

#[derive(Debug, Default)]
struct StoreState {
    appointments: HashMap<Uuid, Appointment>,
    exceptions: Vec<AppointmentException>,
}

/// Record store kept in process memory.
///
/// Used by the command-line front end and by tests. A poisoned lock is
/// reported as an unavailable store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    /// Get all appointments sorted by start time.
    pub fn appointments(&self) -> StoreResult<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> =
            self.state()?.appointments.values().cloned().collect();
        appointments.sort_by_key(|a| (a.start_time, a.id));
        Ok(appointments)
    }

    /// Get the instances of one series sorted by start time.
    pub fn series(&self, series_id: Uuid) -> StoreResult<Vec<Appointment>> {
        Ok(self
            .appointments()?
            .into_iter()
            .filter(|a| a.series_id == Some(series_id))
            .collect())
    }

    pub fn get(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.state()?.appointments.get(&id).cloned())
    }

    /// Exceptions in the order they were recorded.
    pub fn exceptions(&self) -> StoreResult<Vec<AppointmentException>> {
        Ok(self.state()?.exceptions.clone())
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.state()?.appointments.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl RecordStore for InMemoryStore {
    fn find_overlapping(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_id: Option<Uuid>,
    ) -> StoreResult<Vec<Appointment>> {
        let state = self.state()?;
        let mut found: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.status != AppointmentStatus::Cancelled)
            .filter(|a| Some(a.id) != exclude_id)
            .filter(|a| a.overlaps(start, end))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.start_time);
        Ok(found)
    }

    fn find_series_instance(
        &self,
        series_id: Uuid,
        start: NaiveDateTime,
    ) -> StoreResult<Option<Appointment>> {
        let state = self.state()?;
        Ok(state
            .appointments
            .values()
            .find(|a| a.series_id == Some(series_id) && a.start_time == start)
            .cloned())
    }

    fn insert(&self, draft: AppointmentDraft) -> StoreResult<Appointment> {
        draft
            .validate()
            .map_err(|e| StoreError::ConstraintViolation(e.to_string()))?;

        let appointment = Appointment::from_draft(Uuid::new_v4(), draft);
        self.state()?
            .appointments
            .insert(appointment.id, appointment.clone());
        debug!(id = %appointment.id, start = %appointment.start_time, "inserted appointment");
        Ok(appointment)
    }

    fn update_by_id(&self, id: Uuid, update: &AppointmentUpdate) -> StoreResult<Appointment> {
        let mut state = self.state()?;
        let stored = state
            .appointments
            .get_mut(&id)
            .ok_or(StoreError::NotFound {
                entity: "appointment",
                id,
            })?;

        let mut updated = stored.clone();
        update
            .apply_to(&mut updated)
            .map_err(|e| StoreError::ConstraintViolation(e.to_string()))?;
        *stored = updated.clone();
        Ok(updated)
    }

    fn update_where(&self, window: &SeriesWindow, update: &SeriesUpdate) -> StoreResult<usize> {
        let mut state = self.state()?;
        let mut changed = 0;
        for appointment in state.appointments.values_mut() {
            if window.matches(appointment) {
                update.apply_to(appointment);
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn delete_by_id(&self, id: Uuid) -> StoreResult<()> {
        self.state()?
            .appointments
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                entity: "appointment",
                id,
            })
    }

    fn insert_exception(&self, exception: AppointmentException) -> StoreResult<AppointmentException> {
        self.state()?.exceptions.push(exception.clone());
        info!(
            series_id = %exception.series_id,
            original_date = %exception.original_date,
            kind = %exception.exception_type,
            "recorded series exception"
        );
        Ok(exception)
    }
}

impl fmt::Display for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state() {
            Ok(state) => write!(
                f,
                "InMemoryStore(appointments={}, exceptions={})",
                state.appointments.len(),
                state.exceptions.len()
            ),
            Err(_) => write!(f, "InMemoryStore(unavailable)"),
        }
    }
}

//! Record store contract.
//!
//! The scheduling core owns no persistent state. Everything it reads or writes
//! goes through a [`RecordStore`], which is the only shared mutable resource.
//! Implementations must report infrastructure failures as
//! [`StoreError::Unavailable`](crate::error::StoreError::Unavailable).

mod memory;

pub use memory::InMemoryStore;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{
    Appointment, AppointmentDraft, AppointmentException, AppointmentStatus, AppointmentUpdate,
    SeriesUpdate,
};

/// Selects the instances of one series from a point in time onward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesWindow {
    pub series_id: Uuid,
    pub starting_at_or_after: NaiveDateTime,
    /// Only instances currently in one of these states. `None` selects every
    /// state; an empty list selects nothing.
    pub statuses: Option<Vec<AppointmentStatus>>,
}

impl SeriesWindow {
    pub fn new(series_id: Uuid, starting_at_or_after: NaiveDateTime) -> Self {
        SeriesWindow {
            series_id,
            starting_at_or_after,
            statuses: None,
        }
    }

    pub fn with_statuses(mut self, statuses: Vec<AppointmentStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        appointment.series_id == Some(self.series_id)
            && appointment.start_time >= self.starting_at_or_after
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&appointment.status))
    }
}

pub trait RecordStore: Send + Sync {
    /// Non-cancelled appointments overlapping the half-open interval `[start, end)`.
    fn find_overlapping(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_id: Option<Uuid>,
    ) -> StoreResult<Vec<Appointment>>;

    /// The instance of `series_id` whose start time equals `start`, if any.
    fn find_series_instance(
        &self,
        series_id: Uuid,
        start: NaiveDateTime,
    ) -> StoreResult<Option<Appointment>>;

    fn insert(&self, draft: AppointmentDraft) -> StoreResult<Appointment>;

    fn update_by_id(&self, id: Uuid, update: &AppointmentUpdate) -> StoreResult<Appointment>;

    /// Apply `update` to every instance selected by `window`, returning how many changed.
    fn update_where(&self, window: &SeriesWindow, update: &SeriesUpdate) -> StoreResult<usize>;

    fn delete_by_id(&self, id: Uuid) -> StoreResult<()>;

    fn insert_exception(&self, exception: AppointmentException) -> StoreResult<AppointmentException>;
}

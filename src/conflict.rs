//! Time-interval conflict detection against the record store.
//!
//! Intervals are half-open: `[10:00, 11:00)` and `[11:00, 12:00)` touch but do
//! not conflict. The answer is advisory; a concurrent insert between the check
//! and the caller's own insert can still double-book.

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{validate_interval, Appointment};
use crate::store::RecordStore;

pub struct ConflictDetector<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> ConflictDetector<'a, S> {
    pub fn new(store: &'a S) -> Self {
        ConflictDetector { store }
    }

    /// Non-cancelled appointments overlapping `[start, end)`, minus `exclude_id`.
    pub fn conflicts(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>> {
        validate_interval(start, end)?;
        let overlapping = self
            .store
            .find_overlapping(start, end, exclude_id)
            .map_err(|e| {
                warn!(error = %e, %start, %end, "overlap query failed");
                e
            })?;
        debug!(%start, %end, found = overlapping.len(), "checked for conflicts");
        Ok(overlapping)
    }

    /// Whether `[start, end)` overlaps any non-cancelled appointment.
    ///
    /// A store failure is returned as an error, never as `false`.
    pub fn has_conflict(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_id: Option<Uuid>,
    ) -> Result<bool> {
        Ok(!self.conflicts(start, end, exclude_id)?.is_empty())
    }
}

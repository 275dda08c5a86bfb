//! Error types for the scheduling core.
//!
//! Validation failures are detected before the record store is touched and are
//! never retried. Store failures are passed through unchanged; in particular a
//! failed overlap query is never reinterpreted as "no conflict".

use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::models::AppointmentStatus;

/// Message shown to users when the record store fails underneath an operation.
pub const STORE_FAILURE_MESSAGE: &str = "could not complete the scheduling operation, please retry";

/// Failures reported by a [`RecordStore`](crate::store::RecordStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),
}

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("invalid recurrence pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid appointment: {0}")]
    InvalidBase(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("slot duration must be positive, got {0} minutes")]
    InvalidSlotDuration(i64),

    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("series {series_id} has no instance starting at {original_date}")]
    InstanceNotFound {
        series_id: Uuid,
        original_date: NaiveDateTime,
    },

    #[error("the requested time conflicts with {count} existing appointment(s)")]
    Conflict { count: usize },

    #[error("date arithmetic left the supported calendar range")]
    DateOutOfRange,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SchedulingError {
    /// True for errors caused by the caller's input rather than infrastructure.
    pub fn is_validation(&self) -> bool {
        !matches!(self, SchedulingError::Store(_))
    }

    pub fn is_store_failure(&self) -> bool {
        matches!(self, SchedulingError::Store(_))
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, SchedulingError::Store(StoreError::Unavailable(_)))
    }

    /// Text suitable for showing to the person who triggered the operation.
    pub fn user_message(&self) -> String {
        match self {
            SchedulingError::Store(_) => STORE_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = SchedulingError> = std::result::Result<T, E>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_get_generic_message() {
        let err = SchedulingError::from(StoreError::Unavailable("connection reset".into()));
        assert!(err.is_store_failure());
        assert!(err.is_store_unavailable());
        assert!(!err.is_validation());
        assert_eq!(err.user_message(), STORE_FAILURE_MESSAGE);
    }

    #[test]
    fn validation_failures_keep_actionable_message() {
        let err = SchedulingError::InvalidBase("start time must be before end time".into());
        assert!(err.is_validation());
        assert_eq!(
            err.user_message(),
            "invalid appointment: start time must be before end time"
        );
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = SchedulingError::InvalidTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Scheduled,
        };
        assert_eq!(
            err.to_string(),
            "cannot change status from completed to scheduled"
        );
    }
}

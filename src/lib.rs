//! Appointment scheduling and recurrence engine.
//!
//! A stateless core for practice management: it expands recurrence patterns
//! into appointment instances, detects overlapping bookings, finds open slots
//! within business hours and applies bulk changes to a series. All persistence
//! goes through the [`RecordStore`] trait.

pub mod availability;
pub mod config;
pub mod conflict;
pub mod error;
pub mod logging;
pub mod models;
pub mod mutator;
pub mod recurrence;
pub mod scheduler;
pub mod series;
pub mod store;

pub use availability::AvailabilityFinder;
pub use config::{BusinessHours, SchedulerConfig, SlotOverflow};
pub use conflict::ConflictDetector;
pub use error::{SchedulingError, StoreError};
pub use models::{
    Appointment, AppointmentDraft, AppointmentException, AppointmentStatus, AppointmentType,
    AppointmentUpdate, ExceptionType, SeriesUpdate, TimeSlot,
};
pub use mutator::{ExceptionKind, ExceptionOutcome, SeriesMutator};
pub use recurrence::{next_occurrence, RecurrencePattern, RecurrenceType};
pub use scheduler::{ConflictPolicy, FailedInstance, Scheduler, SeriesBookingReport};
pub use series::SeriesGenerator;
pub use store::{InMemoryStore, RecordStore, SeriesWindow};

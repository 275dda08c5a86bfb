//! Data models for the scheduling core.
//!
//! This module defines the records the scheduler reads from and writes to the
//! record store:
//! - AppointmentStatus / AppointmentType: closed enumerations stored as snake_case text
//! - AppointmentDraft: a validated appointment that has not been assigned an id
//! - Appointment: a persisted appointment
//! - SeriesUpdate / AppointmentUpdate: typed partial updates
//! - AppointmentException: audit record for a deviation from a series
//! - TimeSlot: a candidate interval offered by the availability finder

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::recurrence::RecurrencePattern;

/// Generates a closed enum with `as_str`, `Display` and `FromStr`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = SchedulingError;

            fn from_str(value: &str) -> Result<Self> {
                match value.trim().to_lowercase().as_str() {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(SchedulingError::InvalidBase(format!(
                        "'{}' is not a valid {}; expected one of: {}",
                        value,
                        stringify!($name),
                        [$($s),+].join(", ")
                    ))),
                }
            }
        }
    };
}

text_enum!(
    /// Lifecycle state of an appointment.
    ///
    /// `scheduled` is the initial state. `cancelled`, `completed` and `no_show`
    /// are terminal; nothing ever returns to `scheduled`.
    AppointmentStatus {
        Scheduled => "scheduled",
        Confirmed => "confirmed",
        Cancelled => "cancelled",
        Completed => "completed",
        NoShow => "no_show",
    }
);

text_enum!(
    /// Visit category. Informational only to the scheduling core.
    AppointmentType {
        Consultation => "consultation",
        FollowUp => "follow_up",
        Procedure => "procedure",
        CheckUp => "check_up",
        Therapy => "therapy",
        Telehealth => "telehealth",
        Other => "other",
    }
);

text_enum!(
    /// Kind of deviation recorded against one series instance.
    ExceptionType {
        Cancelled => "cancelled",
        Rescheduled => "rescheduled",
        Modified => "modified",
    }
);

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Cancelled | AppointmentStatus::Completed | AppointmentStatus::NoShow
        )
    }

    /// Whether moving from `self` to `next` is an allowed transition.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        match self {
            Scheduled => matches!(next, Confirmed | Cancelled | Completed | NoShow),
            Confirmed => matches!(next, Cancelled | Completed | NoShow),
            Cancelled | Completed | NoShow => false,
        }
    }

    /// Validate a transition, returning the new status.
    pub fn transition_to(&self, next: AppointmentStatus) -> Result<AppointmentStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SchedulingError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// Every status that may legally move to `next`.
    pub fn sources_of(next: AppointmentStatus) -> Vec<AppointmentStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|status| status.can_transition_to(next))
            .collect()
    }
}

impl Default for AppointmentStatus {
    fn default() -> Self {
        AppointmentStatus::Scheduled
    }
}

impl Default for AppointmentType {
    fn default() -> Self {
        AppointmentType::Consultation
    }
}

/// An appointment that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub title: String,
    pub contact_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub series_id: Option<Uuid>,
    pub recurrence_pattern: Option<RecurrencePattern>,
}

impl AppointmentDraft {
    /// Create a new draft with validation.
    pub fn new(
        title: impl Into<String>,
        contact_id: impl Into<String>,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Result<Self> {
        let draft = AppointmentDraft {
            title: title.into(),
            contact_id: contact_id.into(),
            start_time,
            end_time,
            status: AppointmentStatus::Scheduled,
            appointment_type: AppointmentType::default(),
            notes: None,
            location: None,
            series_id: None,
            recurrence_pattern: None,
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn with_type(mut self, appointment_type: AppointmentType) -> Self {
        self.appointment_type = appointment_type;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Check the fields every appointment must carry before it reaches a store.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(SchedulingError::MissingField("title"));
        }
        if self.contact_id.trim().is_empty() {
            return Err(SchedulingError::MissingField("contact_id"));
        }
        if !matches!(
            self.status,
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
        ) {
            return Err(SchedulingError::InvalidBase(format!(
                "a new appointment cannot start as {}",
                self.status
            )));
        }
        validate_interval(self.start_time, self.end_time)
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

/// A persisted appointment. The store assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub title: String,
    pub contact_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub series_id: Option<Uuid>,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub cancellation_reason: Option<String>,
}

impl Appointment {
    pub fn from_draft(id: Uuid, draft: AppointmentDraft) -> Self {
        Appointment {
            id,
            title: draft.title,
            contact_id: draft.contact_id,
            start_time: draft.start_time,
            end_time: draft.end_time,
            status: draft.status,
            appointment_type: draft.appointment_type,
            notes: draft.notes,
            location: draft.location,
            series_id: draft.series_id,
            recurrence_pattern: draft.recurrence_pattern,
            cancellation_reason: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Half-open overlap test against `[start, end)`.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start_time < end && self.end_time > start
    }

    pub fn is_series_member(&self) -> bool {
        self.series_id.is_some()
    }
}

/// Fields that may be changed on every instance of a series at once.
///
/// Start and end times are not part of this set; see [`AppointmentUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesUpdate {
    pub title: Option<String>,
    pub contact_id: Option<String>,
    pub appointment_type: Option<AppointmentType>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub cancellation_reason: Option<String>,
}

impl SeriesUpdate {
    pub fn status(status: AppointmentStatus) -> Self {
        SeriesUpdate {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &SeriesUpdate::default()
    }

    pub fn validate(&self) -> Result<()> {
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(SchedulingError::MissingField("title"));
        }
        if matches!(&self.contact_id, Some(contact) if contact.trim().is_empty()) {
            return Err(SchedulingError::MissingField("contact_id"));
        }
        Ok(())
    }

    pub fn apply_to(&self, appointment: &mut Appointment) {
        if let Some(title) = &self.title {
            appointment.title = title.clone();
        }
        if let Some(contact_id) = &self.contact_id {
            appointment.contact_id = contact_id.clone();
        }
        if let Some(appointment_type) = self.appointment_type {
            appointment.appointment_type = appointment_type;
        }
        if let Some(notes) = &self.notes {
            appointment.notes = Some(notes.clone());
        }
        if let Some(location) = &self.location {
            appointment.location = Some(location.clone());
        }
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(reason) = &self.cancellation_reason {
            appointment.cancellation_reason = Some(reason.clone());
        }
    }
}

/// Partial update of a single appointment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    #[serde(flatten)]
    pub fields: SeriesUpdate,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

impl AppointmentUpdate {
    pub fn reschedule(start_time: NaiveDateTime, end_time: NaiveDateTime) -> Self {
        AppointmentUpdate {
            fields: SeriesUpdate::default(),
            start_time: Some(start_time),
            end_time: Some(end_time),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.start_time.is_none() && self.end_time.is_none()
    }

    /// Apply the update, rejecting a result whose interval is not forward.
    pub fn apply_to(&self, appointment: &mut Appointment) -> Result<()> {
        let start_time = self.start_time.unwrap_or(appointment.start_time);
        let end_time = self.end_time.unwrap_or(appointment.end_time);
        validate_interval(start_time, end_time)?;

        self.fields.apply_to(appointment);
        appointment.start_time = start_time;
        appointment.end_time = end_time;
        Ok(())
    }
}

impl From<SeriesUpdate> for AppointmentUpdate {
    fn from(fields: SeriesUpdate) -> Self {
        AppointmentUpdate {
            fields,
            start_time: None,
            end_time: None,
        }
    }
}

/// Audit record for a deviation applied to one instance of a series.
///
/// The appointment itself stays authoritative for the instance's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentException {
    pub id: Uuid,
    pub series_id: Uuid,
    pub original_date: NaiveDateTime,
    pub exception_type: ExceptionType,
    pub new_start_time: Option<NaiveDateTime>,
    pub new_end_time: Option<NaiveDateTime>,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

impl AppointmentException {
    pub fn new(
        series_id: Uuid,
        original_date: NaiveDateTime,
        exception_type: ExceptionType,
        reason: Option<String>,
    ) -> Self {
        AppointmentException {
            id: Uuid::new_v4(),
            series_id,
            original_date,
            exception_type,
            new_start_time: None,
            new_end_time: None,
            reason,
            created_at: Local::now().naive_local(),
        }
    }

    pub fn rescheduled(
        series_id: Uuid,
        original_date: NaiveDateTime,
        new_start_time: NaiveDateTime,
        new_end_time: NaiveDateTime,
        reason: Option<String>,
    ) -> Self {
        AppointmentException {
            new_start_time: Some(new_start_time),
            new_end_time: Some(new_end_time),
            ..Self::new(series_id, original_date, ExceptionType::Rescheduled, reason)
        }
    }
}

/// A candidate interval offered by the availability finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSlot {
    /// Create a new time slot with validation.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        validate_interval(start, end)?;
        Ok(TimeSlot { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Check if this time slot overlaps with another.
    pub fn overlaps_with(&self, other: &TimeSlot) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Check if a datetime falls within this time slot.
    pub fn contains(&self, dt: &NaiveDateTime) -> bool {
        &self.start <= dt && dt < &self.end
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%H:%M")
        )
    }
}

pub(crate) fn validate_interval(start: NaiveDateTime, end: NaiveDateTime) -> Result<()> {
    if end <= start {
        return Err(SchedulingError::InvalidBase(
            "start time must be before end time".to_string(),
        ));
    }
    Ok(())
}

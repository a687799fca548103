use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// WEEKLY AVAILABILITY TEMPLATE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayOfWeek::Monday => write!(f, "MONDAY"),
            DayOfWeek::Tuesday => write!(f, "TUESDAY"),
            DayOfWeek::Wednesday => write!(f, "WEDNESDAY"),
            DayOfWeek::Thursday => write!(f, "THURSDAY"),
            DayOfWeek::Friday => write!(f, "FRIDAY"),
            DayOfWeek::Saturday => write!(f, "SATURDAY"),
            DayOfWeek::Sunday => write!(f, "SUNDAY"),
        }
    }
}

/// One day of the weekly template. A closed day carries no times; an open
/// day has a working window and an optional break window inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub day_of_week: DayOfWeek,
    pub available: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub break_start_time: Option<NaiveTime>,
    pub break_end_time: Option<NaiveTime>,
}

impl DaySchedule {
    pub fn closed(day_of_week: DayOfWeek) -> Self {
        Self {
            day_of_week,
            available: false,
            start_time: None,
            end_time: None,
            break_start_time: None,
            break_end_time: None,
        }
    }

    /// The effective break window. An absent bound or an empty window
    /// (start == end) means no break.
    pub fn break_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.break_start_time, self.break_end_time) {
            (Some(start), Some(end)) if start < end => Some((start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub week_schedule: Vec<DaySchedule>,
    pub slot_duration: u32,
}

impl Availability {
    pub fn day(&self, day_of_week: DayOfWeek) -> Option<&DaySchedule> {
        self.week_schedule.iter().find(|d| d.day_of_week == day_of_week)
    }
}

// ==============================================================================
// DOCTOR PROFILE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: String,
    #[serde(default)]
    pub specializations: Vec<String>,
    pub qualification: Option<String>,
    pub bio: Option<String>,
    pub clinic_name: Option<String>,
    pub consultation_fee: Option<f64>,
    pub verified: bool,
    pub accepting_patients: bool,
    pub availability: Option<Availability>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDoctorRequest {
    pub specializations: Option<Vec<String>>,
    pub qualification: Option<String>,
    pub bio: Option<String>,
    pub clinic_name: Option<String>,
    pub consultation_fee: Option<f64>,
    pub accepting_patients: Option<bool>,
    pub availability: Option<Availability>,
}

// ==============================================================================
// TIME SLOTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
    pub appointment_id: Option<Uuid>,
}

impl TimeSlot {
    pub fn is_booked(&self) -> bool {
        self.appointment_id.is_some()
    }
}

/// A generated slot before it exists in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCandidate {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
    pub appointment_id: Option<Uuid>,
}

impl NewTimeSlot {
    pub fn from_candidate(doctor_id: Uuid, date: NaiveDate, candidate: &SlotCandidate) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            date,
            start_time: candidate.start_time,
            end_time: candidate.end_time,
            available: true,
            appointment_id: None,
        }
    }
}

// ==============================================================================
// REGENERATION AND DELETION REPORTS
// ==============================================================================

/// Outcome of reconciling one date against the generator output.
#[derive(Debug, Clone, Default)]
pub struct DateReconciliation {
    pub added: u32,
    pub removed: u32,
    pub booked_conflicts: Vec<Uuid>,
}

/// Outcome of a full forward-window regeneration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerationReport {
    pub dates_processed: u32,
    pub slots_added: u32,
    pub slots_removed: u32,
    /// Booked slots the new schedule would no longer generate. They are kept
    /// in place and reported rather than silently dropped.
    pub booked_conflicts: Vec<Uuid>,
}

impl RegenerationReport {
    pub fn absorb(&mut self, date: DateReconciliation) {
        self.dates_processed += 1;
        self.slots_added += date.added;
        self.slots_removed += date.removed;
        self.booked_conflicts.extend(date.booked_conflicts);
    }
}

/// Best-effort bulk delete: booked slots are skipped and reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteReport {
    pub deleted: u32,
    pub skipped: Vec<Uuid>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Week schedule must contain exactly one entry for {0}")]
    MissingDay(DayOfWeek),

    #[error("Week schedule contains more than one entry for {0}")]
    DuplicateDay(DayOfWeek),

    #[error("{0} is marked available but has no working hours")]
    MissingTimes(DayOfWeek),

    #[error("{0} is closed but still carries time fields")]
    ClosedDayWithTimes(DayOfWeek),

    #[error("{0} start time must be before end time")]
    InvalidTimeOrder(DayOfWeek),

    #[error("{0} break window must lie within the working hours")]
    InvalidBreak(DayOfWeek),

    #[error("{0} break window is incomplete")]
    IncompleteBreak(DayOfWeek),

    #[error("Slot duration must be a positive number of minutes")]
    InvalidSlotDuration,
}

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("Time slot not found")]
    NotFound,

    #[error("Time slot is already booked")]
    AlreadyBooked,

    #[error("Cannot delete a booked time slot")]
    Booked,

    #[error("Time slot belongs to another doctor")]
    Unauthorized,

    #[error("Store operation timed out")]
    Timeout,

    #[error("Database error: {0}")]
    Database(String),
}

impl SlotError {
    /// Classify a store failure: timeouts are retryable, the rest terminal.
    pub fn from_store(err: anyhow::Error) -> Self {
        if shared_database::supabase::is_timeout(&err) {
            SlotError::Timeout
        } else {
            SlotError::Database(err.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor has no availability schedule")]
    NoSchedule,

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Store operation timed out")]
    Timeout,

    #[error("Database error: {0}")]
    Database(String),
}

impl DoctorError {
    pub fn from_store(err: anyhow::Error) -> Self {
        if shared_database::supabase::is_timeout(&err) {
            DoctorError::Timeout
        } else {
            DoctorError::Database(err.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

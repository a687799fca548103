use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::models::SlotError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub reason_for_visit: String,
    pub symptoms: Option<String>,
    pub rejection_reason: Option<String>,
    pub video_call_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    PendingApproval,
    Scheduled,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Cancelled and completed appointments are history; no event moves
    /// them anywhere.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::PendingApproval => write!(f, "PENDING_APPROVAL"),
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentType {
    Video,
    Phone,
    InPerson,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Video => write!(f, "VIDEO"),
            AppointmentType::Phone => write!(f, "PHONE"),
            AppointmentType::InPerson => write!(f, "IN_PERSON"),
        }
    }
}

/// Lifecycle events a caller can apply to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentEvent {
    Approve,
    Reject,
    Cancel,
    Complete,
}

/// The acting identity behind a request, resolved from the auth context.
/// Ownership checks run against it before any state is inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Patient(Uuid),
    Doctor(Uuid),
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub reason_for_visit: String,
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Time slot is not available")]
    SlotUnavailable,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not accepting patients")]
    DoctorNotAccepting,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStateTransition(AppointmentStatus),

    #[error("Not authorized to act on this appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store operation timed out")]
    Timeout,

    #[error("Database error: {0}")]
    Database(String),
}

impl AppointmentError {
    pub fn from_store(err: anyhow::Error) -> Self {
        if shared_database::supabase::is_timeout(&err) {
            AppointmentError::Timeout
        } else {
            AppointmentError::Database(err.to_string())
        }
    }
}

impl From<SlotError> for AppointmentError {
    fn from(err: SlotError) -> Self {
        match err {
            // A bind that matched no open row is a lost race from the
            // booking caller's point of view.
            SlotError::AlreadyBooked | SlotError::NotFound => AppointmentError::SlotUnavailable,
            SlotError::Booked => AppointmentError::SlotUnavailable,
            SlotError::Unauthorized => AppointmentError::Unauthorized,
            SlotError::Timeout => AppointmentError::Timeout,
            SlotError::Database(msg) => AppointmentError::Database(msg),
        }
    }
}

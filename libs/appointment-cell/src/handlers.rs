use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use doctor_cell::models::{Doctor, DoctorError, SlotError};
use doctor_cell::services::doctor::DoctorService;
use doctor_cell::services::slots::SlotStore;
use shared_config::AppConfig;
use shared_models::api::PageParams;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Actor, AppointmentError, AppointmentStatus, CancelAppointmentRequest,
    CreateAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotQueryParams {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DoctorAppointmentsQuery {
    pub status: Option<AppointmentStatus>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RejectQuery {
    pub reason: Option<String>,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::SlotUnavailable => {
            AppError::Conflict("Time slot is no longer available".to_string())
        }
        AppointmentError::DoctorNotAccepting => {
            AppError::BadRequest("Doctor is not accepting patients".to_string())
        }
        AppointmentError::InvalidStateTransition(status) => {
            AppError::BadRequest(format!("Appointment cannot be modified in status {}", status))
        }
        AppointmentError::Unauthorized => {
            AppError::Forbidden("Not authorized to act on this appointment".to_string())
        }
        AppointmentError::Validation(msg) => AppError::BadRequest(msg),
        AppointmentError::Timeout => AppError::Timeout,
        AppointmentError::Database(msg) => AppError::Database(msg),
    }
}

fn map_slot_error(e: SlotError) -> AppError {
    match e {
        SlotError::NotFound => AppError::NotFound("Time slot not found".to_string()),
        SlotError::Booked | SlotError::AlreadyBooked => {
            AppError::Conflict("Cannot delete a booked time slot".to_string())
        }
        SlotError::Unauthorized => {
            AppError::Forbidden("Time slot belongs to another doctor".to_string())
        }
        SlotError::Timeout => AppError::Timeout,
        SlotError::Database(msg) => AppError::Database(msg),
    }
}

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user identity".to_string()))
}

/// Resolve the doctor profile of the authenticated user; doctors act through
/// their profile id, not their user id.
async fn require_doctor(state: &AppConfig, user: &User, token: &str) -> Result<Doctor, AppError> {
    if !user.is_doctor() {
        return Err(AppError::Forbidden("Doctor role required".to_string()));
    }

    DoctorService::new(state)
        .get_doctor_by_user(&user.id, token)
        .await
        .map_err(|e| match e {
            DoctorError::NotFound => AppError::NotFound("Doctor profile not found".to_string()),
            DoctorError::Timeout => AppError::Timeout,
            other => AppError::Database(other.to_string()),
        })
}

fn require_patient(user: &User) -> Result<Uuid, AppError> {
    if !user.is_patient() {
        return Err(AppError::Forbidden("Patient role required".to_string()));
    }
    user_uuid(user)
}

// ==============================================================================
// BOOKING AND LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = require_patient(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .book_appointment(patient_id, request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "data": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_appointment_error)?;

    // Only the two participants may read the record.
    let is_patient = user.is_patient()
        && user_uuid(&user).map(|id| id == appointment.patient_id).unwrap_or(false);
    let is_doctor = if user.is_doctor() {
        require_doctor(&state, &user, token).await
            .map(|doctor| doctor.id == appointment.doctor_id)
            .unwrap_or(false)
    } else {
        false
    };

    if !is_patient && !is_doctor {
        return Err(AppError::Forbidden("Not authorized to view this appointment".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "data": appointment,
        "message": "Appointment retrieved"
    })))
}

#[axum::debug_handler]
pub async fn approve_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor = require_doctor(&state, &user, token).await?;

    let appointment = AppointmentBookingService::new(&state)
        .approve(appointment_id, Actor::Doctor(doctor.id), token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "data": appointment,
        "message": "Appointment approved"
    })))
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Query(query): Query<RejectQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor = require_doctor(&state, &user, token).await?;

    let appointment = AppointmentBookingService::new(&state)
        .reject(appointment_id, Actor::Doctor(doctor.id), query.reason, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "data": appointment,
        "message": "Appointment rejected"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    request: Option<Json<CancelAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let actor = if user.is_doctor() {
        Actor::Doctor(require_doctor(&state, &user, token).await?.id)
    } else {
        Actor::Patient(require_patient(&user)?)
    };

    let reason = request.and_then(|Json(r)| r.reason);

    let appointment = AppointmentBookingService::new(&state)
        .cancel(appointment_id, actor, reason, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "data": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor = require_doctor(&state, &user, token).await?;

    let appointment = AppointmentBookingService::new(&state)
        .complete(appointment_id, Actor::Doctor(doctor.id), token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "data": appointment,
        "message": "Appointment completed"
    })))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<PageParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient_id = require_patient(&user)?;

    let page = AppointmentBookingService::new(&state)
        .get_patient_appointments(patient_id, params.page(), params.size(), auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "data": page,
        "message": "Appointments retrieved"
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorAppointmentsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor = require_doctor(&state, &user, token).await?;

    let params = PageParams { page: query.page, size: query.size };
    let page = AppointmentBookingService::new(&state)
        .get_doctor_appointments(doctor.id, query.status, params.page(), params.size(), token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "data": page,
        "message": "Appointments retrieved"
    })))
}

#[axum::debug_handler]
pub async fn get_pending_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<PageParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor = require_doctor(&state, &user, token).await?;

    let page = AppointmentBookingService::new(&state)
        .get_pending_appointments(doctor.id, params.page(), params.size(), token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "data": page,
        "message": "Pending appointments retrieved"
    })))
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let slots = SlotStore::new(&state)
        .list_slots(query.doctor_id, query.date, auth.token())
        .await
        .map_err(map_slot_error)?;

    Ok(Json(json!({
        "success": true,
        "data": slots,
        "message": "Time slots retrieved"
    })))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<AppConfig>>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor = require_doctor(&state, &user, token).await?;

    SlotStore::new(&state)
        .delete_slot(slot_id, doctor.id, token)
        .await
        .map_err(map_slot_error)?;

    Ok(Json(json!({
        "success": true,
        "data": null,
        "message": "Time slot deleted"
    })))
}

#[axum::debug_handler]
pub async fn bulk_delete_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(slot_ids): Json<Vec<Uuid>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor = require_doctor(&state, &user, token).await?;

    let report = SlotStore::new(&state)
        .bulk_delete_slots(&slot_ids, doctor.id, token)
        .await
        .map_err(map_slot_error)?;

    let message = if report.skipped.is_empty() {
        format!("{} time slots deleted", report.deleted)
    } else {
        format!("{} time slots deleted, {} skipped (booked)", report.deleted, report.skipped.len())
    };

    Ok(Json(json!({
        "success": true,
        "data": report,
        "message": message
    })))
}

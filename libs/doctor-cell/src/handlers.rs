use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AvailabilityError, Doctor, DoctorError, UpdateDoctorRequest};
use crate::services::availability::AvailabilityService;
use crate::services::doctor::DoctorService;

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::NoSchedule => {
            AppError::BadRequest("Doctor has no availability schedule".to_string())
        }
        DoctorError::Schedule(e) => AppError::ValidationError(e.to_string()),
        DoctorError::Timeout => AppError::Timeout,
        DoctorError::Database(msg) => AppError::Database(msg),
    }
}

fn map_availability_error(e: AvailabilityError) -> AppError {
    match e {
        AvailabilityError::Doctor(e) => map_doctor_error(e),
        AvailabilityError::Schedule(e) => AppError::ValidationError(e.to_string()),
        AvailabilityError::Slot(e) => match e {
            crate::models::SlotError::Timeout => AppError::Timeout,
            other => AppError::Database(other.to_string()),
        },
    }
}

/// Resolve the doctor profile of the authenticated user, enforcing the
/// doctor role along the way.
pub(crate) async fn require_doctor(
    service: &DoctorService,
    user: &User,
    token: &str,
) -> Result<Doctor, AppError> {
    if !user.is_doctor() {
        return Err(AppError::Forbidden("Doctor role required".to_string()));
    }

    service.get_doctor_by_user(&user.id, token).await
        .map_err(|e| match e {
            DoctorError::NotFound => AppError::NotFound("Doctor profile not found".to_string()),
            other => map_doctor_error(other),
        })
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service.get_doctor(doctor_id, auth.token()).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "data": doctor,
        "message": "Doctor retrieved"
    })))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctor = require_doctor(&doctor_service, &user, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "data": doctor,
        "message": "Doctor profile retrieved"
    })))
}

/// Save the profile, availability block included. Validation runs here;
/// slot regeneration does not — the UI pairs this call with an explicit
/// POST /doctors/me/generate-slots.
#[axum::debug_handler]
pub async fn update_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor_service = DoctorService::new(&state);
    let doctor = require_doctor(&doctor_service, &user, token).await?;

    let updated = doctor_service.update_profile(doctor.id, request, token).await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "data": updated,
        "message": "Doctor profile updated"
    })))
}

#[axum::debug_handler]
pub async fn generate_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor_service = DoctorService::new(&state);
    let doctor = require_doctor(&doctor_service, &user, token).await?;

    let availability_service = AvailabilityService::new(&state);
    let report = availability_service.regenerate(&doctor, token).await
        .map_err(map_availability_error)?;

    Ok(Json(json!({
        "success": true,
        "data": report,
        "message": "Time slots generated successfully"
    })))
}

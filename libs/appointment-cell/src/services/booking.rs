use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::services::doctor::DoctorService;
use doctor_cell::services::slots::SlotStore;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::api::PageResponse;

use crate::models::{
    Actor, Appointment, AppointmentError, AppointmentEvent, AppointmentStatus,
    AppointmentType, CreateAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    slot_store: SlotStore,
    doctor_service: DoctorService,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            slot_store: SlotStore::with_client(Arc::clone(&supabase)),
            doctor_service: DoctorService::with_client(Arc::clone(&supabase)),
            lifecycle: AppointmentLifecycleService::new(),
            supabase,
        }
    }

    /// Book the slot addressed by (doctor, date, start time) for a patient.
    ///
    /// The slot is bound first through the store's atomic check-and-set;
    /// only then is the appointment row written. If that write fails the
    /// bind is compensated by releasing the slot, so a crashed or aborted
    /// booking never leaves a booked slot without an appointment behind it.
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for patient {} with doctor {}", patient_id, request.doctor_id);

        if request.reason_for_visit.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "Reason for visit is required".to_string(),
            ));
        }

        let doctor = self.doctor_service
            .get_doctor(request.doctor_id, auth_token)
            .await
            .map_err(|e| match e {
                doctor_cell::models::DoctorError::NotFound => AppointmentError::DoctorNotFound,
                doctor_cell::models::DoctorError::Timeout => AppointmentError::Timeout,
                other => AppointmentError::Database(other.to_string()),
            })?;

        if !doctor.accepting_patients {
            return Err(AppointmentError::DoctorNotAccepting);
        }

        let slot = self.slot_store
            .find_slot(doctor.id, request.appointment_date, request.start_time, auth_token)
            .await?
            .ok_or(AppointmentError::SlotUnavailable)?;

        let appointment_id = Uuid::new_v4();

        // Atomic check-and-set: of two concurrent bookings on this slot,
        // exactly one PATCH matches the open row.
        let bound_slot = self.slot_store
            .bind_appointment(slot.id, appointment_id, auth_token)
            .await?;

        match self.insert_appointment(appointment_id, patient_id, &doctor.id, &bound_slot, &request, auth_token).await {
            Ok(appointment) => {
                info!("Appointment {} booked on slot {}", appointment.id, slot.id);
                Ok(appointment)
            }
            Err(e) => {
                // Roll the bind back; release is idempotent, so a failure
                // here can be retried by the caller without harm.
                warn!("Appointment insert failed, releasing slot {}: {}", slot.id, e);
                if let Err(release_err) = self.slot_store.release_slot(slot.id, auth_token).await {
                    error!("Failed to release slot {} after booking failure: {}", slot.id, release_err);
                }
                Err(e)
            }
        }
    }

    async fn insert_appointment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: &Uuid,
        slot: &doctor_cell::models::TimeSlot,
        request: &CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();

        let video_call_link = match request.appointment_type {
            AppointmentType::Video => Some(generate_video_call_link()),
            _ => None,
        };

        let appointment_data = json!({
            "id": appointment_id,
            "patientId": patient_id,
            "doctorId": doctor_id,
            "appointmentDate": slot.date,
            "startTime": slot.start_time,
            "endTime": slot.end_time,
            "type": request.appointment_type,
            "status": AppointmentStatus::PendingApproval,
            "reasonForVisit": request.reason_for_visit,
            "symptoms": request.symptoms,
            "rejectionReason": null,
            "videoCallLink": video_call_link,
            "createdAt": now.to_rfc3339(),
            "updatedAt": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(Method::POST, "/rest/v1/appointments", Some(auth_token), Some(appointment_data), Some(headers))
            .await
            .map_err(AppointmentError::from_store)?;

        let row = result.into_iter().next()
            .ok_or_else(|| AppointmentError::Database("Failed to create appointment".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::Database(format!("Failed to parse created appointment: {}", e)))
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(AppointmentError::from_store)?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| AppointmentError::Database(format!("Failed to parse appointment: {}", e)))
    }

    pub async fn approve(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, actor, AppointmentEvent::Approve, None, auth_token).await
    }

    pub async fn reject(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, actor, AppointmentEvent::Reject, reason, auth_token).await
    }

    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        // A patient walking away must say why; the doctor side may cancel
        // without a reason.
        if matches!(actor, Actor::Patient(_)) && reason.as_deref().map_or(true, |r| r.trim().is_empty()) {
            return Err(AppointmentError::Validation(
                "Cancellation reason is required".to_string(),
            ));
        }

        self.transition(appointment_id, actor, AppointmentEvent::Cancel, reason, auth_token).await
    }

    pub async fn complete(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, actor, AppointmentEvent::Complete, None, auth_token).await
    }

    /// Apply a lifecycle event: ownership check, state check, status write,
    /// then the slot side effect.
    async fn transition(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        event: AppointmentEvent,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        self.lifecycle.authorize(&appointment, &actor, event)?;
        let next = self.lifecycle.next_status(appointment.status, event)?;

        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(next));
        if let Some(reason) = reason {
            update_data.insert("rejectionReason".to_string(), json!(reason));
        }
        update_data.insert("updatedAt".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(Value::Object(update_data)), Some(headers))
            .await
            .map_err(AppointmentError::from_store)?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        let updated: Appointment = serde_json::from_value(row)
            .map_err(|e| AppointmentError::Database(format!("Failed to parse updated appointment: {}", e)))?;

        if self.lifecycle.releases_slot(event) {
            self.slot_store
                .release_by_appointment(appointment_id, auth_token)
                .await
                .map_err(AppointmentError::from)?;
        }

        info!("Appointment {} moved to {} via {:?}", appointment_id, next, event);
        Ok(updated)
    }

    pub async fn get_patient_appointments(
        &self,
        patient_id: Uuid,
        page: u32,
        size: u32,
        auth_token: &str,
    ) -> Result<PageResponse<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patientId=eq.{}&order=appointmentDate.desc,startTime.desc&limit={}&offset={}",
            patient_id, size, page * size
        );
        self.fetch_page(&path, page, size, auth_token).await
    }

    pub async fn get_doctor_appointments(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
        page: u32,
        size: u32,
        auth_token: &str,
    ) -> Result<PageResponse<Appointment>, AppointmentError> {
        let mut path = format!("/rest/v1/appointments?doctorId=eq.{}", doctor_id);
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        path.push_str(&format!(
            "&order=appointmentDate.desc,startTime.desc&limit={}&offset={}",
            size, page * size
        ));
        self.fetch_page(&path, page, size, auth_token).await
    }

    /// The doctor-side "requests" tab: bookings still waiting for a verdict.
    pub async fn get_pending_appointments(
        &self,
        doctor_id: Uuid,
        page: u32,
        size: u32,
        auth_token: &str,
    ) -> Result<PageResponse<Appointment>, AppointmentError> {
        self.get_doctor_appointments(
            doctor_id,
            Some(AppointmentStatus::PendingApproval),
            page,
            size,
            auth_token,
        ).await
    }

    async fn fetch_page(
        &self,
        path: &str,
        page: u32,
        size: u32,
        auth_token: &str,
    ) -> Result<PageResponse<Appointment>, AppointmentError> {
        let (rows, total) = self.supabase
            .request_with_count::<Value>(path, Some(auth_token))
            .await
            .map_err(AppointmentError::from_store)?;

        let appointments = rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::Database(format!("Failed to parse appointments: {}", e)))?;

        Ok(PageResponse::new(appointments, page, size, total))
    }
}

fn generate_video_call_link() -> String {
    format!("https://meet.docport.health/{}", Uuid::new_v4())
}

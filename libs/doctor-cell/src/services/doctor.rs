use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, DoctorError, UpdateDoctorRequest};
use crate::services::schedule;

pub struct DoctorService {
    supabase: Arc<SupabaseClient>,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self { supabase: Arc::new(SupabaseClient::new(config)) }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        self.fetch_one(&path, auth_token).await
    }

    /// Resolve the doctor profile behind an authenticated user.
    pub async fn get_doctor_by_user(&self, user_id: &str, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile for user: {}", user_id);

        let path = format!("/rest/v1/doctors?userId=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    /// Update the profile. A submitted availability block is normalized and
    /// validated here; persisting it does NOT regenerate slots — the UI
    /// follows up with the explicit generate-slots call.
    pub async fn update_profile(
        &self,
        doctor_id: Uuid,
        mut request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", doctor_id);

        if let Some(availability) = request.availability.as_mut() {
            schedule::normalize(availability);
            schedule::validate(availability)?;
        }

        let mut update_data = serde_json::Map::new();

        if let Some(specializations) = request.specializations {
            update_data.insert("specializations".to_string(), json!(specializations));
        }
        if let Some(qualification) = request.qualification {
            update_data.insert("qualification".to_string(), json!(qualification));
        }
        if let Some(bio) = request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(clinic_name) = request.clinic_name {
            update_data.insert("clinicName".to_string(), json!(clinic_name));
        }
        if let Some(fee) = request.consultation_fee {
            update_data.insert("consultationFee".to_string(), json!(fee));
        }
        if let Some(accepting) = request.accepting_patients {
            update_data.insert("acceptingPatients".to_string(), json!(accepting));
        }
        if let Some(availability) = request.availability {
            update_data.insert("availability".to_string(), json!(availability));
        }

        update_data.insert("updatedAt".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(Value::Object(update_data)), Some(headers))
            .await
            .map_err(DoctorError::from_store)?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| DoctorError::Database(format!("Failed to parse updated doctor: {}", e)))
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<Doctor, DoctorError> {
        let result: Vec<Value> = self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(DoctorError::from_store)?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| DoctorError::Database(format!("Failed to parse doctor: {}", e)))
    }
}

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            slot_horizon_days: 30,
            request_timeout_seconds: 10,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for the portal's tables, shared by the cell test
/// suites that mock the store with wiremock.
pub struct MockPortalResponses;

impl MockPortalResponses {
    pub fn doctor_row(doctor_id: &str, user_id: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "userId": user_id,
            "specializations": ["General Medicine"],
            "qualification": "MBBS, MD",
            "bio": "General practitioner",
            "clinicName": "Downtown Clinic",
            "consultationFee": 75.0,
            "verified": true,
            "acceptingPatients": true,
            "availability": {
                "weekSchedule": Self::week_schedule_weekdays(),
                "slotDuration": 30
            },
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z"
        })
    }

    /// Weekday template 09:00-17:00 with a 13:00-14:00 break, weekend closed.
    pub fn week_schedule_weekdays() -> serde_json::Value {
        let open = |day: &str| json!({
            "dayOfWeek": day,
            "available": true,
            "startTime": "09:00:00",
            "endTime": "17:00:00",
            "breakStartTime": "13:00:00",
            "breakEndTime": "14:00:00"
        });
        let closed = |day: &str| json!({
            "dayOfWeek": day,
            "available": false,
            "startTime": null,
            "endTime": null,
            "breakStartTime": null,
            "breakEndTime": null
        });
        json!([
            open("MONDAY"), open("TUESDAY"), open("WEDNESDAY"),
            open("THURSDAY"), open("FRIDAY"),
            closed("SATURDAY"), closed("SUNDAY")
        ])
    }

    pub fn slot_row(slot_id: &str, doctor_id: &str, date: &str, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": slot_id,
            "doctorId": doctor_id,
            "date": date,
            "startTime": start,
            "endTime": end,
            "available": true,
            "appointmentId": null
        })
    }

    pub fn booked_slot_row(slot_id: &str, doctor_id: &str, date: &str, start: &str, end: &str,
                           appointment_id: &str) -> serde_json::Value {
        json!({
            "id": slot_id,
            "doctorId": doctor_id,
            "date": date,
            "startTime": start,
            "endTime": end,
            "available": false,
            "appointmentId": appointment_id
        })
    }

    pub fn appointment_row(appointment_id: &str, patient_id: &str, doctor_id: &str,
                           date: &str, start: &str, status: &str) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patientId": patient_id,
            "doctorId": doctor_id,
            "appointmentDate": date,
            "startTime": start,
            "endTime": "09:30:00",
            "type": "IN_PERSON",
            "status": status,
            "reasonForVisit": "Routine checkup",
            "symptoms": null,
            "rejectionReason": null,
            "videoCallLink": null,
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z"
        })
    }
}

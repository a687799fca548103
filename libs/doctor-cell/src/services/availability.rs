use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Availability, AvailabilityError, Doctor, DoctorError, RegenerationReport,
    UpdateDoctorRequest,
};
use crate::services::doctor::DoctorService;
use crate::services::slots::{self, SlotStore};

/// Regeneration is serialized per doctor: a doctor double-submitting a
/// schedule save must not race itself into duplicate slots. One API process
/// owns slot generation, so an in-process lock registry is sufficient.
fn regeneration_lock(doctor_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>> = OnceLock::new();

    let registry = LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = registry.lock().expect("lock registry poisoned");
    map.entry(doctor_id)
        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
        .clone()
}

/// Orchestrates "save weekly schedule" + "regenerate slots" as one logical
/// operation, and the standalone regeneration behind the explicit
/// generate-slots endpoint.
pub struct AvailabilityService {
    doctor_service: DoctorService,
    slot_store: SlotStore,
    horizon_days: u32,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            doctor_service: DoctorService::with_client(Arc::clone(&supabase)),
            slot_store: SlotStore::with_client(supabase),
            horizon_days: config.slot_horizon_days,
        }
    }

    /// Persist a new weekly schedule and bring the forward slot window in
    /// line with it.
    pub async fn update_availability(
        &self,
        doctor_id: Uuid,
        availability: Availability,
        auth_token: &str,
    ) -> Result<RegenerationReport, AvailabilityError> {
        info!("Updating availability for doctor {}", doctor_id);

        let request = UpdateDoctorRequest {
            specializations: None,
            qualification: None,
            bio: None,
            clinic_name: None,
            consultation_fee: None,
            accepting_patients: None,
            availability: Some(availability),
        };

        // update_profile normalizes and validates the schedule before it is
        // written; nothing is regenerated if validation fails.
        let doctor = self.doctor_service
            .update_profile(doctor_id, request, auth_token)
            .await?;

        self.regenerate(&doctor, auth_token).await
    }

    /// Regenerate the forward slot window from the stored schedule.
    ///
    /// Booked slots survive untouched whatever the new schedule says; the
    /// report lists the ones the schedule would no longer generate.
    pub async fn regenerate(
        &self,
        doctor: &Doctor,
        auth_token: &str,
    ) -> Result<RegenerationReport, AvailabilityError> {
        let availability = doctor.availability.as_ref()
            .ok_or(DoctorError::NoSchedule)?;

        let lock = regeneration_lock(doctor.id);
        let _guard = lock.lock().await;

        let today = Utc::now().date_naive();
        let mut report = RegenerationReport::default();

        for offset in 0..self.horizon_days {
            let date = today + Duration::days(offset as i64);
            let candidates = slots::slots_for_date(availability, date);

            debug!("Reconciling {} candidates for doctor {} on {}", candidates.len(), doctor.id, date);
            let outcome = self.slot_store
                .reconcile_date(doctor.id, date, &candidates, auth_token)
                .await?;

            report.absorb(outcome);
        }

        if !report.booked_conflicts.is_empty() {
            warn!(
                "Schedule change for doctor {} left {} booked slots outside the new schedule",
                doctor.id,
                report.booked_conflicts.len()
            );
        }

        info!(
            "Regenerated slots for doctor {}: {} dates, +{} -{}",
            doctor.id, report.dates_processed, report.slots_added, report.slots_removed
        );

        Ok(report)
    }
}

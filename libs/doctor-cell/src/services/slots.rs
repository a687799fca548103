use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Availability, BulkDeleteReport, DateReconciliation, DaySchedule, NewTimeSlot,
    SlotCandidate, SlotError, TimeSlot,
};

// ==============================================================================
// SLOT GENERATION (pure)
// ==============================================================================

/// Expand one day of the weekly template into slot candidates.
///
/// The walk steps from the day's start time on a fixed grid of
/// `slot_duration` minutes. A candidate overlapping the break window is
/// dropped whole (the grid is not re-anchored), and a trailing candidate
/// that would run past the end of the working window is dropped as well, so
/// a window the duration does not divide evenly simply leaves the remainder
/// unused. Output is ascending by construction.
pub fn slot_candidates(day: &DaySchedule, slot_duration: u32) -> Vec<SlotCandidate> {
    if !day.available || slot_duration == 0 {
        return Vec::new();
    }

    let (start, end) = match (day.start_time, day.end_time) {
        (Some(start), Some(end)) => (start, end),
        _ => return Vec::new(),
    };

    let step = Duration::minutes(slot_duration as i64);
    let break_window = day.break_window();

    let mut candidates = Vec::new();
    let mut current = start;

    loop {
        let (slot_end, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 || slot_end > end {
            break;
        }

        let overlaps_break = break_window
            .map(|(break_start, break_end)| current < break_end && slot_end > break_start)
            .unwrap_or(false);

        if !overlaps_break {
            candidates.push(SlotCandidate { start_time: current, end_time: slot_end });
        }

        current = slot_end;
    }

    candidates
}

/// Candidates for a concrete date, resolved through the weekly template.
pub fn slots_for_date(availability: &Availability, date: NaiveDate) -> Vec<SlotCandidate> {
    match availability.day(date.weekday().into()) {
        Some(day) => slot_candidates(day, availability.slot_duration),
        None => Vec::new(),
    }
}

// ==============================================================================
// SLOT STORE
// ==============================================================================

pub struct SlotStore {
    supabase: Arc<SupabaseClient>,
}

impl SlotStore {
    pub fn new(config: &AppConfig) -> Self {
        Self { supabase: Arc::new(SupabaseClient::new(config)) }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// All slots for a doctor on a date, ascending by start time. The order
    /// is load-bearing: the UI groups the day into morning/afternoon/evening
    /// from it.
    pub async fn list_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, SlotError> {
        let path = format!(
            "/rest/v1/time_slots?doctorId=eq.{}&date=eq.{}&order=startTime.asc",
            doctor_id, date
        );
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(SlotError::from_store)?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<TimeSlot>, _>>()
            .map_err(|e| SlotError::Database(format!("Failed to parse time slots: {}", e)))
    }

    pub async fn get_slot(&self, slot_id: Uuid, auth_token: &str) -> Result<TimeSlot, SlotError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}", slot_id);
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(SlotError::from_store)?;

        let row = result.into_iter().next().ok_or(SlotError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| SlotError::Database(format!("Failed to parse time slot: {}", e)))
    }

    /// The slot a booking request addresses by doctor, date and start time.
    pub async fn find_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        auth_token: &str,
    ) -> Result<Option<TimeSlot>, SlotError> {
        let path = format!(
            "/rest/v1/time_slots?doctorId=eq.{}&date=eq.{}&startTime=eq.{}",
            doctor_id, date, start_time
        );
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(SlotError::from_store)?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| SlotError::Database(format!("Failed to parse time slot: {}", e))),
            None => Ok(None),
        }
    }

    pub async fn insert_slots(
        &self,
        slots: &[NewTimeSlot],
        auth_token: &str,
    ) -> Result<(), SlotError> {
        if slots.is_empty() {
            return Ok(());
        }

        let body = serde_json::to_value(slots)
            .map_err(|e| SlotError::Database(format!("Failed to encode time slots: {}", e)))?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let created: Vec<Value> = self.supabase
            .request_with_headers(Method::POST, "/rest/v1/time_slots", Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(SlotError::from_store)?;

        if created.len() != slots.len() {
            warn!("Inserted {} of {} generated slots", created.len(), slots.len());
        }

        Ok(())
    }

    /// Delete one free slot owned by the calling doctor.
    pub async fn delete_slot(
        &self,
        slot_id: Uuid,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SlotError> {
        let slot = self.get_slot(slot_id, auth_token).await?;

        if slot.doctor_id != doctor_id {
            return Err(SlotError::Unauthorized);
        }
        if slot.is_booked() {
            return Err(SlotError::Booked);
        }

        // The availability guard keeps a slot booked between the check above
        // and the delete from being removed.
        let path = format!("/rest/v1/time_slots?id=eq.{}&available=eq.true", slot_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let deleted: Vec<Value> = self.supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(SlotError::from_store)?;

        if deleted.is_empty() {
            return Err(SlotError::Booked);
        }

        debug!("Deleted time slot {} for doctor {}", slot_id, doctor_id);
        Ok(())
    }

    /// Best-effort bulk delete: booked (or concurrently booked) slots are
    /// skipped and reported back, the rest are removed.
    pub async fn bulk_delete_slots(
        &self,
        slot_ids: &[Uuid],
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<BulkDeleteReport, SlotError> {
        let mut report = BulkDeleteReport::default();

        for &slot_id in slot_ids {
            match self.delete_slot(slot_id, doctor_id, auth_token).await {
                Ok(()) => report.deleted += 1,
                Err(SlotError::Booked) => report.skipped.push(slot_id),
                Err(SlotError::NotFound) => {
                    // Already gone; deleting is idempotent from the UI's view.
                    debug!("Bulk delete skipping missing slot {}", slot_id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// Atomically bind an appointment to an open slot.
    ///
    /// The update is guarded by `available=eq.true`, so two concurrent
    /// bookings resolve in the store: the loser's update matches no row and
    /// comes back with an empty representation.
    pub async fn bind_appointment(
        &self,
        slot_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<TimeSlot, SlotError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}&available=eq.true", slot_id);
        let body = json!({
            "available": false,
            "appointmentId": appointment_id
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let updated: Vec<Value> = self.supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(SlotError::from_store)?;

        let row = updated.into_iter().next().ok_or(SlotError::AlreadyBooked)?;
        serde_json::from_value(row)
            .map_err(|e| SlotError::Database(format!("Failed to parse bound slot: {}", e)))
    }

    /// Reopen a slot. Releasing an already-free or missing slot succeeds, so
    /// the booking rollback and cancel/reject paths can be retried safely.
    pub async fn release_slot(&self, slot_id: Uuid, auth_token: &str) -> Result<(), SlotError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}", slot_id);
        self.release(&path, auth_token).await
    }

    /// Reopen whichever slot is bound to the given appointment.
    pub async fn release_by_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SlotError> {
        let path = format!("/rest/v1/time_slots?appointmentId=eq.{}", appointment_id);
        self.release(&path, auth_token).await
    }

    async fn release(&self, path: &str, auth_token: &str) -> Result<(), SlotError> {
        let body = json!({
            "available": true,
            "appointmentId": null
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let _: Vec<Value> = self.supabase
            .request_with_headers(Method::PATCH, path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(SlotError::from_store)?;

        Ok(())
    }

    /// Reconcile one date against the generator output.
    ///
    /// Missing candidates are inserted and free slots the schedule no longer
    /// generates are removed. Booked slots are never touched: a booked slot
    /// outside the new schedule is reported as a conflict instead. Running
    /// this twice with unchanged inputs is a no-op.
    pub async fn reconcile_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        candidates: &[SlotCandidate],
        auth_token: &str,
    ) -> Result<DateReconciliation, SlotError> {
        let existing = self.list_slots(doctor_id, date, auth_token).await?;
        let mut report = DateReconciliation::default();

        let mut stale_free: Vec<Uuid> = Vec::new();
        for slot in &existing {
            let still_generated = candidates.iter().any(|c| {
                c.start_time == slot.start_time && c.end_time == slot.end_time
            });
            if still_generated {
                continue;
            }
            if slot.is_booked() {
                report.booked_conflicts.push(slot.id);
            } else {
                stale_free.push(slot.id);
            }
        }

        let new_slots: Vec<NewTimeSlot> = candidates.iter()
            .filter(|c| !existing.iter().any(|s| {
                s.start_time == c.start_time && s.end_time == c.end_time
            }))
            .map(|c| NewTimeSlot::from_candidate(doctor_id, date, c))
            .collect();

        if !stale_free.is_empty() {
            report.removed = self.delete_free_slots(&stale_free, auth_token).await?;
        }
        if !new_slots.is_empty() {
            self.insert_slots(&new_slots, auth_token).await?;
            report.added = new_slots.len() as u32;
        }

        Ok(report)
    }

    async fn delete_free_slots(&self, slot_ids: &[Uuid], auth_token: &str) -> Result<u32, SlotError> {
        let ids = slot_ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        // Same availability guard as the single delete: a slot booked since
        // the listing survives the sweep.
        let path = format!("/rest/v1/time_slots?id=in.({})&available=eq.true", ids);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let deleted: Vec<Value> = self.supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(SlotError::from_store)?;

        Ok(deleted.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayOfWeek;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday(start: (u32, u32), end: (u32, u32), brk: Option<((u32, u32), (u32, u32))>) -> DaySchedule {
        DaySchedule {
            day_of_week: DayOfWeek::Monday,
            available: true,
            start_time: Some(time(start.0, start.1)),
            end_time: Some(time(end.0, end.1)),
            break_start_time: brk.map(|(s, _)| time(s.0, s.1)),
            break_end_time: brk.map(|(_, e)| time(e.0, e.1)),
        }
    }

    fn starts(candidates: &[SlotCandidate]) -> Vec<NaiveTime> {
        candidates.iter().map(|c| c.start_time).collect()
    }

    #[test]
    fn morning_window_without_break() {
        let day = monday((9, 0), (12, 0), None);
        let candidates = slot_candidates(&day, 30);

        assert_eq!(
            starts(&candidates),
            vec![time(9, 0), time(9, 30), time(10, 0), time(10, 30), time(11, 0), time(11, 30)]
        );
        assert_eq!(candidates.last().unwrap().end_time, time(12, 0));
    }

    #[test]
    fn candidate_overlapping_break_is_dropped_whole() {
        let day = monday((9, 0), (12, 0), Some(((10, 0), (10, 30))));
        let candidates = slot_candidates(&day, 30);

        assert_eq!(
            starts(&candidates),
            vec![time(9, 0), time(9, 30), time(10, 30), time(11, 0), time(11, 30)]
        );
    }

    #[test]
    fn misaligned_break_drops_every_overlapping_candidate() {
        // Break 10:15-10:45 clips both the 10:00 and the 10:30 candidate;
        // the grid stays anchored at 09:00.
        let day = monday((9, 0), (12, 0), Some(((10, 15), (10, 45))));
        let candidates = slot_candidates(&day, 30);

        assert_eq!(
            starts(&candidates),
            vec![time(9, 0), time(9, 30), time(11, 0), time(11, 30)]
        );
    }

    #[test]
    fn trailing_partial_slot_is_dropped() {
        let day = monday((9, 0), (10, 45), None);
        let candidates = slot_candidates(&day, 30);

        assert_eq!(starts(&candidates), vec![time(9, 0), time(9, 30), time(10, 0)]);
    }

    #[test]
    fn closed_day_yields_nothing() {
        let day = DaySchedule::closed(DayOfWeek::Monday);
        assert!(slot_candidates(&day, 30).is_empty());
    }

    #[test]
    fn duration_longer_than_window_yields_nothing() {
        let day = monday((9, 0), (9, 45), None);
        assert!(slot_candidates(&day, 60).is_empty());
    }

    #[test]
    fn output_is_strictly_ascending_and_non_overlapping() {
        let day = monday((8, 30), (18, 0), Some(((12, 0), (13, 0))));
        let candidates = slot_candidates(&day, 45);

        for pair in candidates.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time);
            assert!(pair[0].start_time < pair[1].start_time);
        }
        for c in &candidates {
            assert!(c.start_time >= time(8, 30));
            assert!(c.end_time <= time(18, 0));
            assert!(!(c.start_time < time(13, 0) && c.end_time > time(12, 0)));
        }
    }

    #[test]
    fn window_ending_at_midnight_does_not_wrap() {
        let day = monday((23, 0), (23, 59), None);
        let candidates = slot_candidates(&day, 30);
        assert_eq!(starts(&candidates), vec![time(23, 0)]);
    }

    #[test]
    fn slots_for_date_resolves_day_of_week() {
        let mut week_schedule: Vec<DaySchedule> = DayOfWeek::ALL
            .into_iter()
            .map(DaySchedule::closed)
            .collect();
        week_schedule[0] = monday((9, 0), (12, 0), None);
        let availability = Availability { week_schedule, slot_duration: 30 };

        // 2025-06-02 is a Monday, 2025-06-03 a Tuesday.
        let monday_date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let tuesday_date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();

        assert_eq!(slots_for_date(&availability, monday_date).len(), 6);
        assert!(slots_for_date(&availability, tuesday_date).is_empty());
    }
}

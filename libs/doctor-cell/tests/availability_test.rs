use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::{Availability, DayOfWeek, DaySchedule, Doctor, SlotCandidate};
use doctor_cell::services::availability::AvailabilityService;
use doctor_cell::services::slots::SlotStore;
use shared_utils::test_utils::{MockPortalResponses, TestConfig};

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn candidate(start: (u32, u32), end: (u32, u32)) -> SlotCandidate {
    SlotCandidate {
        start_time: time(start.0, start.1),
        end_time: time(end.0, end.1),
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

#[tokio::test]
async fn reconcile_adds_missing_and_removes_stale_free_slots() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let stale_id = Uuid::new_v4();

    // Store has one stale free slot at 08:00; schedule now generates 09:00
    // and 09:30 only.
    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::slot_row(&stale_id.to_string(), &doctor_id.to_string(), "2025-06-02", "08:00:00", "08:30:00"),
            MockPortalResponses::slot_row(&Uuid::new_v4().to_string(), &doctor_id.to_string(), "2025-06-02", "09:00:00", "09:30:00"),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("id", format!("in.({})", stale_id)))
        .and(query_param("available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::slot_row(&stale_id.to_string(), &doctor_id.to_string(), "2025-06-02", "08:00:00", "08:30:00")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    // Only the 09:30 candidate is missing from the store.
    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .and(body_partial_json(json!([{"startTime": "09:30:00", "endTime": "10:00:00"}])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockPortalResponses::slot_row(&Uuid::new_v4().to_string(), &doctor_id.to_string(), "2025-06-02", "09:30:00", "10:00:00")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = SlotStore::new(&TestConfig::with_url(&server.uri()).to_app_config());
    let candidates = [candidate((9, 0), (9, 30)), candidate((9, 30), (10, 0))];

    let outcome = store.reconcile_date(doctor_id, date(), &candidates, "token").await.unwrap();

    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.removed, 1);
    assert!(outcome.booked_conflicts.is_empty());
}

#[tokio::test]
async fn reconcile_preserves_and_reports_booked_slots_outside_the_schedule() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let booked_id = Uuid::new_v4();

    // The booked 08:00 slot is no longer generated by the new schedule.
    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::booked_slot_row(
                &booked_id.to_string(), &doctor_id.to_string(),
                "2025-06-02", "08:00:00", "08:30:00",
                &Uuid::new_v4().to_string(),
            ),
            MockPortalResponses::slot_row(&Uuid::new_v4().to_string(), &doctor_id.to_string(), "2025-06-02", "09:00:00", "09:30:00"),
        ])))
        .mount(&server)
        .await;

    // The booked slot must never reach a DELETE.
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let store = SlotStore::new(&TestConfig::with_url(&server.uri()).to_app_config());
    let candidates = [candidate((9, 0), (9, 30))];

    let outcome = store.reconcile_date(doctor_id, date(), &candidates, "token").await.unwrap();

    assert_eq!(outcome.added, 0);
    assert_eq!(outcome.removed, 0);
    assert_eq!(outcome.booked_conflicts, vec![booked_id]);
}

#[tokio::test]
async fn reconcile_twice_with_unchanged_schedule_is_a_noop() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::slot_row(&Uuid::new_v4().to_string(), &doctor_id.to_string(), "2025-06-02", "09:00:00", "09:30:00"),
            MockPortalResponses::slot_row(&Uuid::new_v4().to_string(), &doctor_id.to_string(), "2025-06-02", "09:30:00", "10:00:00"),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let store = SlotStore::new(&TestConfig::with_url(&server.uri()).to_app_config());
    let candidates = [candidate((9, 0), (9, 30)), candidate((9, 30), (10, 0))];

    for _ in 0..2 {
        let outcome = store.reconcile_date(doctor_id, date(), &candidates, "token").await.unwrap();
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.removed, 0);
    }
}

#[tokio::test]
async fn regenerate_walks_the_whole_forward_window() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    // Empty store: every generated candidate inserts.
    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_url(&server.uri()).to_app_config();
    let doctor: Doctor = serde_json::from_value(
        MockPortalResponses::doctor_row(&doctor_id.to_string(), &Uuid::new_v4().to_string())
    ).unwrap();

    let service = AvailabilityService::new(&config);
    let report = service.regenerate(&doctor, "token").await.unwrap();

    // 30-day horizon, weekday template: slots appear, nothing conflicts.
    assert_eq!(report.dates_processed, 30);
    assert!(report.slots_added > 0);
    assert_eq!(report.slots_removed, 0);
    assert!(report.booked_conflicts.is_empty());
}

#[tokio::test]
async fn regenerate_requires_a_schedule() {
    let server = MockServer::start().await;
    let config = TestConfig::with_url(&server.uri()).to_app_config();

    let mut doctor: Doctor = serde_json::from_value(
        MockPortalResponses::doctor_row(&Uuid::new_v4().to_string(), &Uuid::new_v4().to_string())
    ).unwrap();
    doctor.availability = None;

    let service = AvailabilityService::new(&config);
    assert!(service.regenerate(&doctor, "token").await.is_err());
}

#[tokio::test]
async fn slots_for_a_closed_day_are_never_generated() {
    // Sanity check at the template level: the weekend of the canned doctor
    // profile is closed and produces no candidates.
    let doctor: Doctor = serde_json::from_value(
        MockPortalResponses::doctor_row(&Uuid::new_v4().to_string(), &Uuid::new_v4().to_string())
    ).unwrap();
    let availability: Availability = doctor.availability.unwrap();

    // 2025-06-07 is a Saturday.
    let saturday = NaiveDate::from_ymd_opt(2025, 6, 7).unwrap();
    assert!(doctor_cell::services::slots::slots_for_date(&availability, saturday).is_empty());

    let sunday_schedule: &DaySchedule = availability.day(DayOfWeek::Sunday).unwrap();
    assert!(!sunday_schedule.available);
}

#[tokio::test]
async fn update_availability_persists_then_regenerates() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    // The schedule is written to the doctor row first...
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::doctor_row(&doctor_id.to_string(), &Uuid::new_v4().to_string())
        ])))
        .expect(1)
        .mount(&server)
        .await;

    // ...then the forward window is reconciled against an empty store.
    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&server)
        .await;

    let doctor: Doctor = serde_json::from_value(
        MockPortalResponses::doctor_row(&doctor_id.to_string(), &Uuid::new_v4().to_string())
    ).unwrap();
    let availability = doctor.availability.unwrap();

    let config = TestConfig::with_url(&server.uri()).to_app_config();
    let report = AvailabilityService::new(&config)
        .update_availability(doctor_id, availability, "token")
        .await
        .unwrap();

    assert_eq!(report.dates_processed, 30);
    assert!(report.slots_added > 0);
}

#[tokio::test]
async fn update_availability_rejects_an_invalid_schedule_without_touching_slots() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let doctor: Doctor = serde_json::from_value(
        MockPortalResponses::doctor_row(&doctor_id.to_string(), &Uuid::new_v4().to_string())
    ).unwrap();
    let mut availability = doctor.availability.unwrap();
    // Monday ends before it starts.
    availability.week_schedule[0].start_time = Some(time(17, 0));
    availability.week_schedule[0].end_time = Some(time(9, 0));

    let config = TestConfig::with_url(&server.uri()).to_app_config();
    let result = AvailabilityService::new(&config)
        .update_availability(doctor_id, availability, "token")
        .await;

    assert!(result.is_err());
}

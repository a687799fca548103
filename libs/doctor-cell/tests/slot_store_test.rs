use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::SlotError;
use doctor_cell::services::slots::SlotStore;
use shared_utils::test_utils::{MockPortalResponses, TestConfig};

fn store_for(server: &MockServer) -> SlotStore {
    SlotStore::new(&TestConfig::with_url(&server.uri()).to_app_config())
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

#[tokio::test]
async fn list_slots_parses_rows_in_store_order() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("doctorId", format!("eq.{}", doctor_id)))
        .and(query_param("date", "eq.2025-06-02"))
        .and(query_param("order", "startTime.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::slot_row(&Uuid::new_v4().to_string(), &doctor_id.to_string(), "2025-06-02", "09:00:00", "09:30:00"),
            MockPortalResponses::slot_row(&Uuid::new_v4().to_string(), &doctor_id.to_string(), "2025-06-02", "09:30:00", "10:00:00"),
        ])))
        .mount(&server)
        .await;

    let slots = store_for(&server).list_slots(doctor_id, date(), "token").await.unwrap();

    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    assert!(slots[0].available);
    assert!(slots[0].appointment_id.is_none());
}

#[tokio::test]
async fn bind_appointment_wins_when_slot_is_open() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("id", format!("eq.{}", slot_id)))
        .and(query_param("available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::booked_slot_row(
                &slot_id.to_string(), &doctor_id.to_string(),
                "2025-06-02", "09:00:00", "09:30:00",
                &appointment_id.to_string(),
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let bound = store_for(&server).bind_appointment(slot_id, appointment_id, "token").await.unwrap();

    assert!(!bound.available);
    assert_eq!(bound.appointment_id, Some(appointment_id));
}

#[tokio::test]
async fn bind_appointment_loses_the_race_on_empty_representation() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();

    // The WHERE-available-is-true guard matched no row: someone else won.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("id", format!("eq.{}", slot_id)))
        .and(query_param("available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = store_for(&server).bind_appointment(slot_id, Uuid::new_v4(), "token").await;

    assert!(matches!(result, Err(SlotError::AlreadyBooked)));
}

#[tokio::test]
async fn delete_slot_refuses_booked_slots() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("id", format!("eq.{}", slot_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::booked_slot_row(
                &slot_id.to_string(), &doctor_id.to_string(),
                "2025-06-02", "09:00:00", "09:30:00",
                &Uuid::new_v4().to_string(),
            )
        ])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let result = store_for(&server).delete_slot(slot_id, doctor_id, "token").await;

    assert!(matches!(result, Err(SlotError::Booked)));
}

#[tokio::test]
async fn delete_slot_refuses_other_doctors_slots() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::slot_row(
                &slot_id.to_string(), &Uuid::new_v4().to_string(),
                "2025-06-02", "09:00:00", "09:30:00",
            )
        ])))
        .mount(&server)
        .await;

    let result = store_for(&server).delete_slot(slot_id, Uuid::new_v4(), "token").await;

    assert!(matches!(result, Err(SlotError::Unauthorized)));
}

#[tokio::test]
async fn delete_slot_reports_missing_slots() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = store_for(&server).delete_slot(Uuid::new_v4(), Uuid::new_v4(), "token").await;

    assert!(matches!(result, Err(SlotError::NotFound)));
}

#[tokio::test]
async fn bulk_delete_skips_booked_slots_and_reports_them() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let free_id = Uuid::new_v4();
    let booked_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("id", format!("eq.{}", free_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::slot_row(&free_id.to_string(), &doctor_id.to_string(), "2025-06-02", "09:00:00", "09:30:00")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("id", format!("eq.{}", booked_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::booked_slot_row(
                &booked_id.to_string(), &doctor_id.to_string(),
                "2025-06-02", "09:30:00", "10:00:00",
                &Uuid::new_v4().to_string(),
            )
        ])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("id", format!("eq.{}", free_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPortalResponses::slot_row(&free_id.to_string(), &doctor_id.to_string(), "2025-06-02", "09:00:00", "09:30:00")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let report = store_for(&server)
        .bulk_delete_slots(&[free_id, booked_id], doctor_id, "token")
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.skipped, vec![booked_id]);
}

#[tokio::test]
async fn release_is_idempotent_for_missing_slots() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = store_for(&server).release_slot(Uuid::new_v4(), "token").await;

    assert!(result.is_ok());
}

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::AppointmentStatus;
use appointment_cell::services::booking::AppointmentBookingService;
use shared_utils::test_utils::{MockPortalResponses, TestConfig};

fn service_for(server: &MockServer) -> AppointmentBookingService {
    AppointmentBookingService::new(&TestConfig::with_url(&server.uri()).to_app_config())
}

#[tokio::test]
async fn patient_history_is_paged_with_exact_totals() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patientId", format!("eq.{}", patient_id)))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "20"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "20-21/23")
                .set_body_json(json!([
                    MockPortalResponses::appointment_row(
                        &Uuid::new_v4().to_string(), &patient_id.to_string(), &doctor_id.to_string(),
                        "2025-06-02", "09:00:00", "COMPLETED",
                    ),
                    MockPortalResponses::appointment_row(
                        &Uuid::new_v4().to_string(), &patient_id.to_string(), &doctor_id.to_string(),
                        "2025-05-26", "10:00:00", "CANCELLED",
                    ),
                ])),
        )
        .mount(&server)
        .await;

    let page = service_for(&server)
        .get_patient_appointments(patient_id, 2, 10, "token")
        .await
        .unwrap();

    assert_eq!(page.content.len(), 2);
    assert_eq!(page.page, 2);
    assert_eq!(page.total_elements, 23);
    assert_eq!(page.total_pages, 3);
}

#[tokio::test]
async fn pending_queue_filters_on_status() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctorId", format!("eq.{}", doctor_id)))
        .and(query_param("status", "eq.PENDING_APPROVAL"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "0-0/1")
                .set_body_json(json!([
                    MockPortalResponses::appointment_row(
                        &Uuid::new_v4().to_string(), &Uuid::new_v4().to_string(), &doctor_id.to_string(),
                        "2025-06-02", "09:00:00", "PENDING_APPROVAL",
                    ),
                ])),
        )
        .mount(&server)
        .await;

    let page = service_for(&server)
        .get_pending_appointments(doctor_id, 0, 10, "token")
        .await
        .unwrap();

    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].status, AppointmentStatus::PendingApproval);
    assert_eq!(page.total_elements, 1);
}

#[tokio::test]
async fn empty_page_reports_zero_totals() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "*/0")
                .set_body_json(json!([])),
        )
        .mount(&server)
        .await;

    let page = service_for(&server)
        .get_doctor_appointments(doctor_id, None, 0, 10, "token")
        .await
        .unwrap();

    assert!(page.content.is_empty());
    assert_eq!(page.total_elements, 0);
    assert_eq!(page.total_pages, 0);
}

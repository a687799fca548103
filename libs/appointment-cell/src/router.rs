use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))

        // Slot listing and doctor-side slot management
        .route("/slots", get(handlers::list_slots))
        .route("/slots/bulk", delete(handlers::bulk_delete_slots))
        .route("/slots/{slot_id}", delete(handlers::delete_slot))

        // Listings
        .route("/my-appointments", get(handlers::get_my_appointments))
        .route("/doctor/appointments", get(handlers::get_doctor_appointments))
        .route("/doctor/pending", get(handlers::get_pending_appointments))

        // Lifecycle transitions
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/approve", put(handlers::approve_appointment))
        .route("/{appointment_id}/reject", put(handlers::reject_appointment))
        .route("/{appointment_id}/cancel", put(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", put(handlers::complete_appointment))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

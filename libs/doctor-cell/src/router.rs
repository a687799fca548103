use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // All doctor operations require authentication
    let protected_routes = Router::new()
        .route("/me", get(handlers::get_my_profile))
        .route("/me", put(handlers::update_my_profile))
        .route("/me/generate-slots", post(handlers::generate_slots))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

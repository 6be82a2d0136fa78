// libs/prehab-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn prehab_routes(state: Arc<AppConfig>) -> Router {
    // All prehab operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::create_prehab))
        .route("/", get(handlers::list_prehabs))
        .route("/{prehab_id}", get(handlers::get_prehab))
        .route("/{prehab_id}/schedule", get(handlers::get_prehab_calendar))
        .route("/{prehab_id}/status", patch(handlers::update_prehab_status))
        .route("/patients/{patient_id}/statistics", get(handlers::get_patient_statistics))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

use std::sync::Arc;

use axum::{routing::get, Router};

use prehab_cell::router::prehab_routes;
use progress_cell::router::schedule_routes;
use shared_config::AppConfig;
use template_cell::router::template_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Prehab API is running!" }))
        .nest("/templates", template_routes(state.clone()))
        .nest("/prehabs", prehab_routes(state.clone()))
        .nest("/schedule", schedule_routes(state.clone()))
}

// libs/progress-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    // All schedule operations require authentication
    let protected_routes = Router::new()
        .route("/", get(handlers::list_schedule))
        .route("/seen-bulk", post(handlers::mark_seen_bulk))
        .route("/{item_id}", get(handlers::get_scheduled_item))
        .route("/{item_id}/done", post(handlers::mark_done))
        .route("/{item_id}/seen", post(handlers::mark_seen))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

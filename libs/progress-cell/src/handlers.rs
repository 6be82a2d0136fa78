// libs/progress-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use prehab_cell::models::ScheduledItemStatus;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    MarkDoneRequest, MarkSeenBulkRequest, MarkSeenRequest, ProgressError, ScheduleSearchQuery,
};
use crate::services::progress::ProgressService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct ScheduleQueryParams {
    pub patient_id: Option<Uuid>,
    pub prehab_id: Option<Uuid>,
    pub status: Option<ScheduledItemStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

fn map_progress_error(e: ProgressError) -> AppError {
    match e {
        ProgressError::NotFound => AppError::NotFound("Scheduled item not found".to_string()),
        ProgressError::PrehabNotFound => AppError::NotFound("Prehab not found".to_string()),
        ProgressError::AlreadyDone => {
            AppError::InvalidState("This activity was already marked as done".to_string())
        }
        ProgressError::Conflict(msg) => AppError::Conflict(msg),
        ProgressError::Unauthorized => {
            AppError::Permission("Not authorized to access this scheduled item".to_string())
        }
        ProgressError::ValidationError(msg) => AppError::Validation(msg),
        ProgressError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// SCHEDULE LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_schedule(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<ScheduleQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let query = ScheduleSearchQuery {
        patient_id: params.patient_id,
        prehab_id: params.prehab_id,
        status: params.status,
        limit: params.limit,
        offset: params.offset,
    };

    let service = ProgressService::new(&state);
    let items = service
        .list_schedule(&user, query, auth.token())
        .await
        .map_err(map_progress_error)?;

    Ok(Json(json!({ "scheduled_items": items })))
}

#[axum::debug_handler]
pub async fn get_scheduled_item(
    State(state): State<Arc<AppConfig>>,
    Path(item_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = ProgressService::new(&state);
    let item = service
        .get_item(&user, item_id, auth.token())
        .await
        .map_err(map_progress_error)?;

    Ok(Json(json!(item)))
}

// ==============================================================================
// STATE TRANSITION HANDLERS
// ==============================================================================

/// Patient completion report. Patients only; the owning-patient check sits
/// in the service.
#[axum::debug_handler]
pub async fn mark_done(
    State(state): State<Arc<AppConfig>>,
    Path(item_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<MarkDoneRequest>,
) -> Result<Json<Value>, AppError> {
    match user.role {
        Role::Patient => {}
        Role::Admin | Role::Doctor => {
            return Err(AppError::Permission(
                "Only patients can report scheduled activities".to_string(),
            ))
        }
    }

    let service = ProgressService::new(&state);
    let item = service
        .mark_done(&user, item_id, request, auth.token())
        .await
        .map_err(map_progress_error)?;

    Ok(Json(json!({
        "success": true,
        "scheduled_item": item,
        "message": "Activity updated successfully"
    })))
}

/// Doctor review of a single pending item.
#[axum::debug_handler]
pub async fn mark_seen(
    State(state): State<Arc<AppConfig>>,
    Path(item_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<MarkSeenRequest>,
) -> Result<Json<Value>, AppError> {
    match user.role {
        Role::Doctor => {}
        Role::Admin | Role::Patient => {
            return Err(AppError::Permission(
                "Only doctors can review scheduled activities".to_string(),
            ))
        }
    }

    let service = ProgressService::new(&state);
    let item = service
        .mark_seen(&user, item_id, request, auth.token())
        .await
        .map_err(map_progress_error)?;

    Ok(Json(json!({
        "success": true,
        "scheduled_item": item
    })))
}

/// Bulk review over a whole prehab. Doctors and admins; unlike the
/// single-item path there is no per-item state guard.
#[axum::debug_handler]
pub async fn mark_seen_bulk(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<MarkSeenBulkRequest>,
) -> Result<Json<Value>, AppError> {
    match user.role {
        Role::Doctor | Role::Admin => {}
        Role::Patient => {
            return Err(AppError::Permission(
                "Only doctors can review scheduled activities".to_string(),
            ))
        }
    }

    let service = ProgressService::new(&state);
    let updated = service
        .mark_seen_bulk(request, auth.token())
        .await
        .map_err(map_progress_error)?;

    Ok(Json(json!({
        "success": true,
        "updated_items": updated
    })))
}

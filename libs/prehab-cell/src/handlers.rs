// libs/prehab-cell/src/handlers.rs
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

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    CreatePrehabRequest, PrehabError, PrehabSearchQuery, PrehabStatus, UpdatePrehabStatusRequest,
};
use crate::services::prehab::PrehabService;
use crate::services::statistics::StatisticsService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct PrehabQueryParams {
    pub patient_id: Option<Uuid>,
    pub status: Option<PrehabStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

fn map_prehab_error(e: PrehabError) -> AppError {
    match e {
        PrehabError::NotFound => AppError::NotFound("Prehab not found".to_string()),
        PrehabError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        PrehabError::TemplateNotFound => AppError::NotFound("Template not found".to_string()),
        PrehabError::ValidationError(msg) => AppError::Validation(msg),
        PrehabError::InvalidStatusTransition(status) => {
            AppError::InvalidState(format!("Prehab cannot leave status {}", status))
        }
        PrehabError::Unauthorized => {
            AppError::Permission("Not authorized to access this prehab".to_string())
        }
        PrehabError::Conflict(msg) => AppError::Conflict(msg),
        PrehabError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// ENROLLMENT HANDLERS
// ==============================================================================

/// Enroll a patient into a template. Doctors only; the enrolling doctor
/// becomes the plan owner.
#[axum::debug_handler]
pub async fn create_prehab(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrehabRequest>,
) -> Result<Json<Value>, AppError> {
    match user.role {
        Role::Doctor => {}
        Role::Admin | Role::Patient => {
            return Err(AppError::Permission(
                "Only doctors can enroll patients".to_string(),
            ))
        }
    }

    let service = PrehabService::new(&state);
    let prehab = service
        .create_prehab(user.id, request, auth.token())
        .await
        .map_err(map_prehab_error)?;

    Ok(Json(json!({
        "success": true,
        "prehab": prehab,
        "message": "Prehab created successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_prehab(
    State(state): State<Arc<AppConfig>>,
    Path(prehab_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = PrehabService::new(&state);
    let prehab = service
        .get_prehab(&user, prehab_id, auth.token())
        .await
        .map_err(map_prehab_error)?;

    Ok(Json(json!(prehab)))
}

#[axum::debug_handler]
pub async fn list_prehabs(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<PrehabQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let query = PrehabSearchQuery {
        patient_id: params.patient_id,
        status: params.status,
        limit: params.limit,
        offset: params.offset,
    };

    let service = PrehabService::new(&state);
    let prehabs = service
        .list_prehabs(&user, query, auth.token())
        .await
        .map_err(map_prehab_error)?;

    Ok(Json(json!({ "prehabs": prehabs })))
}

/// Full calendar view: scheduled items grouped by date.
#[axum::debug_handler]
pub async fn get_prehab_calendar(
    State(state): State<Arc<AppConfig>>,
    Path(prehab_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = PrehabService::new(&state);
    let calendar = service
        .get_prehab_calendar(&user, prehab_id, auth.token())
        .await
        .map_err(map_prehab_error)?;

    Ok(Json(json!({ "schedule": calendar })))
}

#[axum::debug_handler]
pub async fn update_prehab_status(
    State(state): State<Arc<AppConfig>>,
    Path(prehab_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePrehabStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PrehabService::new(&state);
    let prehab = service
        .update_status(&user, prehab_id, request, auth.token())
        .await
        .map_err(map_prehab_error)?;

    Ok(Json(json!({
        "success": true,
        "prehab": prehab,
        "message": "Prehab status updated"
    })))
}

// ==============================================================================
// STATISTICS HANDLER
// ==============================================================================

#[axum::debug_handler]
pub async fn get_patient_statistics(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = StatisticsService::new(&state);
    let report = service
        .statistics_for_patient(&user, patient_id, auth.token())
        .await
        .map_err(|e| match e {
            PrehabError::NotFound => {
                AppError::NotFound("Patient needs a prehab to retrieve statistics".to_string())
            }
            other => map_prehab_error(other),
        })?;

    Ok(Json(json!(report)))
}

// libs/template-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{CreateTemplateRequest, TemplateError};
use crate::services::template::TemplateService;

fn map_template_error(e: TemplateError) -> AppError {
    match e {
        TemplateError::NotFound => AppError::NotFound("Template not found".to_string()),
        TemplateError::ItemNotFound(item_id) => {
            AppError::NotFound(format!("Catalog item {} does not exist", item_id))
        }
        TemplateError::ValidationError(msg) => AppError::Validation(msg),
        TemplateError::Unauthorized => {
            AppError::Permission("Not authorized to access this template".to_string())
        }
        TemplateError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Create a new multi-week schedule template. Doctors and admins only.
#[axum::debug_handler]
pub async fn create_template(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<Json<Value>, AppError> {
    match user.role {
        Role::Doctor | Role::Admin => {}
        Role::Patient => {
            return Err(AppError::Permission(
                "Only doctors can create schedule templates".to_string(),
            ))
        }
    }

    let service = TemplateService::new(&state);
    let template = service
        .create_template(user.id, request, auth.token())
        .await
        .map_err(map_template_error)?;

    Ok(Json(json!({
        "success": true,
        "template": template,
        "message": "Template created successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_template(
    State(state): State<Arc<AppConfig>>,
    Path(template_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = TemplateService::new(&state);
    let template = service
        .get_template(template_id, auth.token())
        .await
        .map_err(map_template_error)?;

    Ok(Json(json!(template)))
}

#[axum::debug_handler]
pub async fn list_templates(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    match user.role {
        Role::Doctor | Role::Admin => {}
        Role::Patient => {
            return Err(AppError::Permission(
                "Only doctors can browse schedule templates".to_string(),
            ))
        }
    }

    let service = TemplateService::new(&state);
    let templates = service
        .list_templates(auth.token())
        .await
        .map_err(map_template_error)?;

    Ok(Json(json!({ "templates": templates })))
}

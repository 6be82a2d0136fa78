use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::{Platform, User};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Authentication middleware: validates the bearer token, requires a known
/// client platform, and injects the caller as a `User` request extension.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Every client must identify itself as web or mobile
    let platform = request
        .headers()
        .get("Platform")
        .and_then(|value| value.to_str().ok())
        .and_then(Platform::parse)
        .ok_or_else(|| AppError::Permission("Unknown client platform".to_string()))?;

    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth("Invalid authorization header format".to_string()));
    }

    let token = &auth_value[7..];

    let mut user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;
    user.platform = Some(platform);

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Extract the authenticated user from request extensions.
pub async fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

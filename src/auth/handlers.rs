// HTTP handlers for authentication endpoints

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use std::sync::Arc;
use validator::Validate;

use crate::auth::{
    models::{LoginRequest, RefreshRequest, RegisterRequest, TokenPair},
    service::AuthService,
};
use crate::error::ApiError;

/// Register a new user
/// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = TokenPair),
        (status = 400, description = "Invalid input", body = String, example = json!({"error": "password must be at least 6 characters"})),
        (status = 409, description = "Email already registered", body = String, example = json!({"error": "Email already exists"})),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Internal server error"}))
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(service): State<Arc<AuthService>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenPair>), ApiError> {
    let Json(request) = payload?;
    let pair = service.register(request).await?;
    Ok((StatusCode::CREATED, Json(pair)))
}

/// Login a user
/// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = TokenPair),
        (status = 400, description = "Invalid input", body = String),
        (status = 401, description = "Invalid credentials", body = String, example = json!({"error": "Invalid email or password"})),
        (status = 500, description = "Internal server error", body = String)
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(service): State<Arc<AuthService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(request) = payload?;
    let pair = service.login(request).await?;
    Ok(Json(pair))
}

/// Refresh tokens
/// POST /api/auth/refresh
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenPair),
        (status = 400, description = "Invalid input", body = String),
        (status = 401, description = "Invalid refresh token", body = String, example = json!({"error": "Invalid refresh token"})),
        (status = 500, description = "Internal server error", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(service): State<Arc<AuthService>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;
    let pair = service.refresh(request.refresh_token.trim()).await?;
    Ok(Json(pair))
}

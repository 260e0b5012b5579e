// HTTP boundary error type
// Every flow error is classified into one of these variants before it leaves a handler

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::{debug, error, warn};

/// Outcome classification shared by all endpoints
///
/// Renders as the matching status code and a `{"error": message}` body.
/// Internal details are logged and never sent to the client.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or missing input (400)
    BadRequest(String),
    /// Missing, invalid or expired credential (401)
    Unauthorized(String),
    /// Authenticated but not allowed (403)
    Forbidden(String),
    /// No such resource (404)
    NotFound(String),
    /// Uniqueness violation (409)
    Conflict(String),
    /// Storage, filesystem or token-signing failure (500)
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to send to clients
    pub fn client_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg.clone(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(detail) => error!("Internal error: {}", detail),
            ApiError::Unauthorized(msg) => warn!("Unauthorized request: {}", msg),
            ApiError::Forbidden(msg) => warn!("Forbidden request: {}", msg),
            ApiError::Conflict(msg) => warn!("Conflict: {}", msg),
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => debug!("Client error: {}", msg),
        }

        let body = Json(json!({
            "error": self.client_message(),
        }));

        (self.status_code(), body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Invalid multipart form: {}", err.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(format!("Invalid multipart form: {}", rejection.body_text()))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(describe_validation_errors(&errors))
    }
}

/// Flatten field errors into one sorted, comma-separated message
pub fn describe_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}

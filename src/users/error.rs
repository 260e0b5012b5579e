// Error types for the user lifecycle flow

use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

use crate::db::RepositoryError;
use crate::error::ApiError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("User not found")]
    NotFound,

    #[error("Invalid user ID")]
    InvalidId,

    #[error("{0}")]
    Validation(String),

    #[error("Invalid birthdate format. Please use DD.MM.YYYY")]
    InvalidBirthdate,

    #[error("Birthdate cannot be in the future")]
    FutureBirthdate,

    #[error("Default role not found")]
    DefaultRoleMissing,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::PermissionDenied => {
                warn!("User flow permission denied");
                ApiError::Forbidden(err.to_string())
            }
            UserError::NotFound => ApiError::NotFound(err.to_string()),
            UserError::InvalidId
            | UserError::Validation(_)
            | UserError::InvalidBirthdate
            | UserError::FutureBirthdate => ApiError::BadRequest(err.to_string()),
            UserError::Repository(RepositoryError::Conflict(constraint)) => {
                ApiError::Conflict(format!("Conflicting record: {}", constraint))
            }
            UserError::DefaultRoleMissing
            | UserError::Repository(_)
            | UserError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

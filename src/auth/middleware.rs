// Request extractors for protected routes

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use std::convert::Infallible;
use tracing::{debug, warn};

use crate::auth::{error::AuthError, models::Role, token::TokenService};
use crate::users::models::RequestOrigin;

/// Authenticated user extractor for protected routes
///
/// Verifies the `Authorization: Bearer <access token>` header and exposes
/// the caller identity for permission checks.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let endpoint = parts.uri.path().to_string();

        // Extract Authorization header
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| {
                warn!("Missing Authorization header for endpoint: {}", endpoint);
                AuthError::MissingToken
            })?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        // Verify Bearer token format
        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            warn!("Authorization header is not a Bearer token for endpoint: {}", endpoint);
            AuthError::InvalidToken
        })?;

        let token_service = TokenService::from_ref(state);
        let claims = token_service.verify_access_token(token.trim())?;

        debug!("Authenticated user {} ({}) for {}", claims.sub, claims.role, endpoint);
        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// Extractor that only admits callers holding the admin role
///
/// Runs before the request body is read, so a non-admin is refused before
/// any upload is processed.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        match user.role {
            Role::Admin => Ok(RequireAdmin(user)),
            Role::User => Err(AuthError::InsufficientPermissions {
                required: Role::Admin,
                actual: user.role,
            }),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "http".to_string());

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        Ok(RequestOrigin::new(scheme, host))
    }
}

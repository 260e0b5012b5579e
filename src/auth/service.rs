// Authentication service - business logic layer

use std::sync::Arc;

use tracing::{debug, info, warn};
use validator::Validate;

use crate::auth::{
    error::AuthError,
    models::{normalize_email, LoginRequest, RegisterRequest, Role, TokenPair},
    password::PasswordService,
    repository::RoleRepository,
    token::TokenService,
};
use crate::config::BootstrapAdmin;
use crate::db::RepositoryError;
use crate::error::describe_validation_errors;
use crate::users::models::NewUser;
use crate::users::repository::UserRepository;

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => AuthError::EmailAlreadyExists,
            other => AuthError::DatabaseError(other.to_string()),
        }
    }
}

/// Authentication service coordinating registration, login and refresh
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    role_repo: Arc<dyn RoleRepository>,
    token_service: TokenService,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        role_repo: Arc<dyn RoleRepository>,
        token_service: TokenService,
    ) -> Self {
        Self {
            user_repo,
            role_repo,
            token_service,
        }
    }

    /// Register a new account with the default role and return a token pair
    pub async fn register(&self, request: RegisterRequest) -> Result<TokenPair, AuthError> {
        request
            .validate()
            .map_err(|e| AuthError::ValidationError(describe_validation_errors(&e)))?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(AuthError::ValidationError("name is required".to_string()));
        }
        let email = normalize_email(&request.email);
        debug!("Registering account for {}", email);

        if self.user_repo.find_by_email(&email).await?.is_some() {
            warn!("Registration attempted with existing email: {}", email);
            return Err(AuthError::EmailAlreadyExists);
        }

        let role = self
            .role_repo
            .find_by_role(Role::DEFAULT)
            .await?
            .ok_or_else(|| {
                AuthError::ConfigError(format!("default role '{}' not found", Role::DEFAULT))
            })?;

        let password_hash = PasswordService::hash_password(&request.password)?;

        let user = self
            .user_repo
            .create(NewUser {
                name: name.to_string(),
                email: Some(email.clone()),
                password_hash: Some(password_hash),
                age: 0,
                image_name: None,
                role_id: role.id,
            })
            .await?;

        info!("Registered user {} with role '{}'", user.id, user.role);
        self.token_service.issue_pair(user.id, &email, user.role)
    }

    /// Exchange credentials for a token pair
    ///
    /// Unknown email, an account without a password and a wrong password all
    /// fail with the same error.
    pub async fn login(&self, request: LoginRequest) -> Result<TokenPair, AuthError> {
        request
            .validate()
            .map_err(|e| AuthError::ValidationError(describe_validation_errors(&e)))?;

        let email = normalize_email(&request.email);
        debug!("Login attempt for {}", email);

        let user = match self.user_repo.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                warn!("Login failed: unknown email {}", email);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let hash = match user.password_hash.as_deref() {
            Some(hash) => hash,
            None => {
                warn!("Login failed: user {} has no password", user.id);
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !PasswordService::verify_password(&request.password, hash)? {
            warn!("Login failed: wrong password for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        info!("User {} logged in", user.id);
        let email = user.email.as_deref().unwrap_or(&email);
        self.token_service.issue_pair(user.id, email, user.role)
    }

    /// Rotate both tokens, re-reading the user's current role
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let user_id = self
            .token_service
            .verify_refresh_token(refresh_token)
            .map_err(|e| {
                warn!("Refresh rejected: {}", e);
                AuthError::InvalidRefreshToken
            })?;

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| {
                warn!("Refresh token for missing user {}", user_id);
                AuthError::InvalidRefreshToken
            })?;

        debug!("Refreshing tokens for user {} with role '{}'", user.id, user.role);
        self.token_service
            .issue_pair(user.id, user.email.as_deref().unwrap_or_default(), user.role)
    }

    /// Create the configured admin account unless its email is already taken
    ///
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> Result<bool, AuthError> {
        let email = normalize_email(&admin.email);
        if let Some(existing) = self.user_repo.find_by_email(&email).await? {
            if existing.role != Role::Admin {
                warn!(
                    "Bootstrap admin email {} belongs to user {} with role '{}'",
                    email, existing.id, existing.role
                );
            }
            return Ok(false);
        }

        let role = self
            .role_repo
            .find_by_role(Role::Admin)
            .await?
            .ok_or_else(|| AuthError::ConfigError("role 'admin' not found".to_string()))?;

        let user = self
            .user_repo
            .create(NewUser {
                name: admin.name.clone(),
                email: Some(email),
                password_hash: Some(PasswordService::hash_password(&admin.password)?),
                age: 0,
                image_name: None,
                role_id: role.id,
            })
            .await?;

        info!("Created bootstrap admin account {}", user.id);
        Ok(true)
    }
}

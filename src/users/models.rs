// User, file and view models

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::auth::models::Role;
use crate::db::RepositoryError;

/// A stored user account
///
/// `email` and `password_hash` are absent for accounts created by an admin;
/// those accounts cannot log in.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub age: i32,
    pub image_name: Option<String>,
    pub role_id: i32,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `users` row joined with `roles.name`
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub age: i32,
    pub image_name: Option<String>,
    pub role_id: i32,
    pub role_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role_name
            .parse::<Role>()
            .map_err(|_| RepositoryError::Corrupt(format!("unknown role '{}'", row.role_name)))?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            age: row.age,
            image_name: row.image_name,
            role_id: row.role_id,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Values for a user insert
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub age: i32,
    pub image_name: Option<String>,
    pub role_id: i32,
}

/// Record of the image owned by a user (at most one per user)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FileRecord {
    pub id: i32,
    pub file_name: String,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An uploaded image as received from the multipart form
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Parsed multipart form for create and update
///
/// Fields stay optional here; the flow decides which are required.
#[derive(Debug, Clone, Default)]
pub struct UserForm {
    pub name: Option<String>,
    pub birthdate: Option<String>,
    pub image: Option<ImageUpload>,
}

/// Scheme and host of the current request, used to build image URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    pub fn image_url(&self, image_name: &str) -> String {
        format!("{}://{}/images/{}", self.scheme, self.host, image_name)
    }
}

/// Public projection of a user
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserView {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Ann")]
    pub name: String,
    pub email: Option<String>,
    #[schema(example = 26)]
    pub age: i32,
    #[schema(example = "http://localhost:8080/images/1700000000_face.png")]
    pub image_url: Option<String>,
    pub role: Role,
}

impl UserView {
    pub fn from_user(user: &User, origin: &RequestOrigin) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            age: user.age,
            image_url: user.image_name.as_deref().map(|name| origin.image_url(name)),
            role: user.role,
        }
    }
}

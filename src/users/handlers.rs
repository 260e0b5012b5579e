// HTTP handlers for user endpoints

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

use crate::auth::middleware::{AuthenticatedUser, RequireAdmin};
use crate::error::ApiError;
use crate::users::{
    error::UserError,
    models::{ImageUpload, RequestOrigin, UserForm, UserView},
    service::UserService,
};

/// Multipart body accepted by create and update
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UserMultipart {
    #[schema(example = "Bob")]
    name: String,
    /// `DD.MM.YYYY`
    #[schema(example = "15.03.2000")]
    birthdate: String,
    /// Required on create, optional on update
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
}

fn parse_id(raw: &str) -> Result<i32, UserError> {
    raw.trim().parse::<i32>().map_err(|_| UserError::InvalidId)
}

/// Collect the known form fields; unknown fields are skipped
async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UserForm, ApiError> {
    let mut multipart = multipart?;
    let mut form = UserForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("name") => form.name = Some(field.text().await?),
            Some("birthdate") => form.birthdate = Some(field.text().await?),
            Some("image") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    form.image = Some(ImageUpload { file_name, bytes });
                }
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    Ok(form)
}

/// Handler for POST /api/users
#[utoipa::path(
    post,
    path = "/api/users",
    request_body(content = UserMultipart, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "User created", body = UserView),
        (status = 400, description = "Missing or invalid field", body = String, example = json!({"error": "image is required"})),
        (status = 401, description = "Missing or invalid token", body = String),
        (status = 403, description = "Caller is not an admin", body = String),
        (status = 500, description = "Internal server error", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user_handler(
    State(service): State<Arc<UserService>>,
    RequireAdmin(actor): RequireAdmin,
    origin: RequestOrigin,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let form = read_form(multipart).await?;
    let view = service.create_user(&actor, form, &origin).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Handler for GET /api/users
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = Vec<UserView>),
        (status = 401, description = "Missing or invalid token", body = String),
        (status = 500, description = "Internal server error", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_users_handler(
    State(service): State<Arc<UserService>>,
    _user: AuthenticatedUser,
    origin: RequestOrigin,
) -> Result<Json<Vec<UserView>>, ApiError> {
    let users = service.get_all_users(&origin).await?;
    Ok(Json(users))
}

/// Handler for GET /api/users/{id}
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserView),
        (status = 400, description = "Invalid user ID", body = String),
        (status = 401, description = "Missing or invalid token", body = String),
        (status = 404, description = "User not found", body = String),
        (status = 500, description = "Internal server error", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user_handler(
    State(service): State<Arc<UserService>>,
    _user: AuthenticatedUser,
    origin: RequestOrigin,
    Path(id): Path<String>,
) -> Result<Json<UserView>, ApiError> {
    let id = parse_id(&id)?;
    let user = service.get_user(id, &origin).await?;
    Ok(Json(user))
}

/// Handler for PUT /api/users/{id}
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    request_body(content = UserMultipart, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "User updated", body = UserView),
        (status = 400, description = "Missing or invalid field", body = String),
        (status = 401, description = "Missing or invalid token", body = String),
        (status = 403, description = "Caller is neither admin nor the user", body = String),
        (status = 404, description = "User not found", body = String),
        (status = 500, description = "Internal server error", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user_handler(
    State(service): State<Arc<UserService>>,
    actor: AuthenticatedUser,
    origin: RequestOrigin,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UserView>, ApiError> {
    let id = parse_id(&id)?;
    let form = read_form(multipart).await?;
    let user = service.update_user(&actor, id, form, &origin).await?;
    Ok(Json(user))
}

/// Handler for DELETE /api/users/{id}
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Invalid user ID", body = String),
        (status = 401, description = "Missing or invalid token", body = String),
        (status = 403, description = "Caller is not an admin", body = String),
        (status = 404, description = "User not found", body = String),
        (status = 500, description = "Internal server error", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user_handler(
    State(service): State<Arc<UserService>>,
    RequireAdmin(actor): RequireAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    service.delete_user(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

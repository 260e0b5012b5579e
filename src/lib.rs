pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod storage;
pub mod users;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use auth::{
    models::{LoginRequest, RefreshRequest, RegisterRequest, Role, TokenPair},
    repository::{PgRoleRepository, RoleRepository},
    AuthService, TokenService,
};
use config::AppConfig;
use db::DbPool;
use storage::ImageStore;
use users::{
    handlers::UserMultipart, FileRepository, PgFileRepository, PgUserRepository, UserRepository,
    UserService, UserView,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::handlers::register_handler,
        auth::handlers::login_handler,
        auth::handlers::refresh_handler,
        users::handlers::create_user_handler,
        users::handlers::get_users_handler,
        users::handlers::get_user_handler,
        users::handlers::update_user_handler,
        users::handlers::delete_user_handler,
        health,
    ),
    components(
        schemas(RegisterRequest, LoginRequest, RefreshRequest, TokenPair, Role, UserView, UserMultipart)
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "users", description = "User management endpoints"),
        (name = "health", description = "Liveness probe")
    ),
    info(
        title = "User Accounts API",
        version = "1.0.0",
        description = "REST API for user accounts with JWT authentication and per-user images"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub token_service: TokenService,
}

impl AppState {
    /// Wire both flows over the given repositories and image store
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        role_repo: Arc<dyn RoleRepository>,
        file_repo: Arc<dyn FileRepository>,
        images: Arc<dyn ImageStore>,
        token_service: TokenService,
    ) -> Self {
        let auth_service = AuthService::new(
            user_repo.clone(),
            role_repo.clone(),
            token_service.clone(),
        );
        let user_service = UserService::new(user_repo, role_repo, file_repo, images);

        Self {
            auth_service: Arc::new(auth_service),
            user_service: Arc::new(user_service),
            token_service,
        }
    }

    /// PostgreSQL-backed state
    pub fn postgres(pool: DbPool, config: &AppConfig, images: Arc<dyn ImageStore>) -> Self {
        Self::new(
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgRoleRepository::new(pool.clone())),
            Arc::new(PgFileRepository::new(pool)),
            images,
            TokenService::from_config(&config.jwt),
        )
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<UserService> {
    fn from_ref(state: &AppState) -> Self {
        state.user_service.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        state.token_service.clone()
    }
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String, example = json!("ok"))),
    tag = "health"
)]
async fn health() -> &'static str {
    "ok"
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers, serves stored images and adds
/// tracing and CORS middleware
pub fn create_router(state: AppState, image_dir: &Path, max_upload_bytes: usize) -> Router {
    use auth::handlers::{login_handler, refresh_handler, register_handler};
    use users::handlers::{
        create_user_handler, delete_user_handler, get_user_handler, get_users_handler,
        update_user_handler,
    };

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // API routes
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/refresh", post(refresh_handler))
        .route("/api/users", get(get_users_handler).post(create_user_handler))
        .route(
            "/api/users/:id",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        )
        .route("/health", get(health))
        // Stored images
        .nest_service("/images", ServeDir::new(image_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use user_accounts_api::{
    config::AppConfig,
    create_router, db,
    storage::{ImageStore, LocalImageStore},
    AppState,
};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    // RUST_LOG overrides the default filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("user_accounts_api=debug,tower_http=info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("User Accounts API - Starting...");

    let config = AppConfig::from_env().expect("Invalid configuration");

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let images = LocalImageStore::new(config.image_dir.clone());
    images
        .ensure_root()
        .await
        .expect("Failed to create image directory");
    tracing::info!("Storing images in {}", images.root().display());

    let state = AppState::postgres(db_pool, &config, Arc::new(images) as Arc<dyn ImageStore>);

    if let Some(admin) = &config.bootstrap_admin {
        match state.auth_service.ensure_admin(admin).await {
            Ok(true) => tracing::info!("Bootstrap admin {} created", admin.email),
            Ok(false) => tracing::info!("Bootstrap admin {} already present", admin.email),
            Err(e) => panic!("Failed to create bootstrap admin: {}", e),
        }
    }

    // Create the application router
    let app = create_router(state, &config.image_dir, config.max_upload_bytes);

    // Start the Axum server
    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("User Accounts API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}

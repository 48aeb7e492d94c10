//! Permitdesk API composition root.

#![forbid(unsafe_code)]

mod dto;
mod error;
mod handlers;
mod state;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use permitdesk_application::{
    BlobStore, MAX_IMAGE_BYTES, PermitService, SystemPermitIdSuffixSource,
};
use permitdesk_core::AppError;
use permitdesk_infrastructure::{FilesystemBlobStore, PostgresBlobStore, PostgresPermitRepository};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

    let database_url = required_env("DATABASE_URL")?;
    let frontend_url =
        env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

    let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let api_port = env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(5000);

    let blob_storage = env::var("BLOB_STORAGE").unwrap_or_else(|_| "filesystem".to_owned());
    let uploads_dir = env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_owned());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if migrate_only {
        info!("database migrations applied successfully");
        pool.close().await;
        return Ok(());
    }

    let (blob_store, serve_local_uploads): (Arc<dyn BlobStore>, bool) = match blob_storage.as_str()
    {
        "filesystem" => {
            let store = FilesystemBlobStore::new(uploads_dir.as_str());
            store.ensure_directory().await?;
            (Arc::new(store), true)
        }
        "database" => (Arc::new(PostgresBlobStore::new(pool.clone())), false),
        _ => {
            return Err(AppError::Validation(format!(
                "BLOB_STORAGE must be either 'filesystem' or 'database', got '{blob_storage}'"
            )));
        }
    };

    let repository = Arc::new(PostgresPermitRepository::new(pool.clone()));
    let permit_service = PermitService::new(
        repository,
        blob_store.clone(),
        Arc::new(SystemPermitIdSuffixSource),
    );

    let app_state = AppState {
        permit_service,
        blob_store,
    };

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/api/health", get(handlers::health::health_handler))
        .route(
            "/api/permits",
            get(handlers::permits::list_permits_handler)
                .post(handlers::permits::create_permit_handler),
        )
        .route(
            "/api/permits/status",
            get(handlers::permits::check_permit_status_handler),
        )
        .route(
            "/api/permits/{id}",
            get(handlers::permits::get_permit_handler)
                .patch(handlers::permits::update_permit_handler)
                .delete(handlers::permits::delete_permit_handler),
        );

    // The upload surface depends on the active blob strategy: local files are
    // served statically, database blobs are streamed through a handler.
    let app = if serve_local_uploads {
        api_routes.nest_service("/uploads", ServeDir::new(uploads_dir.as_str()))
    } else {
        api_routes.route(
            "/api/uploads/{id}",
            get(handlers::uploads::fetch_upload_handler),
        )
    };

    let app = app
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 1024 * 1024))
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let host = IpAddr::from_str(&api_host)
        .map_err(|error| AppError::Internal(format!("invalid API_HOST '{api_host}': {error}")))?;
    let address = SocketAddr::from((host, api_port));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, blob_storage = %blob_storage, "permitdesk-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))?;

    pool.close().await;
    info!("database pool closed, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "failed to listen for shutdown signal");
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

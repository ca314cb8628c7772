mod auth;
mod config;
mod constants;
mod handlers;
mod state;

use actix_multipart::form::MultipartFormConfig;
use actix_web::{web, App, HttpServer};
use config::{ServerConfig, StorageType};
use constants::MAX_UPLOAD_REQUEST_BYTES;
use state::AppState;
use tracing::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing with env filter
    // Filter out actix-server worker shutdown messages
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,actix_server::worker=warn,actix_server::accept=warn",
                )
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting drive server (PID: {})", std::process::id());

    let config = ServerConfig::load().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    match config.storage_type {
        StorageType::Filesystem => info!("Using filesystem storage: {:?}", config.data_dir),
        StorageType::Database => {
            info!("Using database storage");
            info!(
                "Database retry configuration: max_attempts={}, initial_delay_seconds={}",
                config.database_retry_config.max_attempts,
                config.database_retry_config.initial_delay_seconds
            );
        }
        StorageType::Memory => info!("Using in-memory storage, data is lost on shutdown"),
    }

    let store = config.storage_backend()?.initialize().await.map_err(|e| {
        error!("Failed to initialize storage: {:#}", e);
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to initialize storage: {:#}", e),
        )
    })?;
    info!(
        "Storage backend initialized successfully ({} workers)",
        config.workers
    );

    // Initialize application state
    let state = web::Data::new(AppState::new(store, config.workers));

    let bind_address = config.bind_address();
    info!("Starting server on http://{}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(
                MultipartFormConfig::default()
                    .total_limit(MAX_UPLOAD_REQUEST_BYTES),
            )
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .map_err(|e| {
        error!("Failed to bind to {}: {}", bind_address, e);
        e
    })?;

    info!("Server bound successfully to http://{}", bind_address);

    server.run().await
}

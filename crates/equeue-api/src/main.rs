use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use equeue_api::config::AppConfig;
use equeue_api::services::ProcessGate;
use equeue_api::{build_router, AppState};
use equeue_core::Broker;
use equeue_db::{Database, PoolConfig};
use equeue_jobs::{ChangeFeedListener, ListenerConfig, MaintenanceConfig, MaintenanceTimer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "equeue_api=debug,equeue_jobs=info,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "equeue_api=debug,equeue_jobs=info,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("equeue-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = AppConfig::from_env()?;
    if config.internal_api_key.is_none() {
        warn!("INTERNAL_API_KEY is not set, admin routes are locked");
    }

    let db = Database::connect_with_config(&config.database_url, PoolConfig::from_env()).await?;
    db.migrate().await?;
    info!("Database connected and migrated");

    let broker = Broker::new();
    let gate = ProcessGate::load(Arc::new(db.business_processes.clone())).await?;

    let listener_handle =
        ChangeFeedListener::new(db.pool.clone(), broker.clone(), ListenerConfig::from_env())
            .start();
    let maintenance_handle =
        MaintenanceTimer::from_database(&db, MaintenanceConfig::from_env()).start();

    let state = AppState::new(db, broker, gate, config.internal_api_key.clone());
    let app = build_router(state.clone(), &config.allowed_origins);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    info!("Server stopped, shutting down background tasks");
    if let Err(e) = listener_handle.shutdown().await {
        warn!(error = %e, "Change feed listener did not stop cleanly");
    }
    if let Err(e) = maintenance_handle.shutdown().await {
        warn!(error = %e, "Maintenance timer did not stop cleanly");
    }

    Ok(())
}

/// Wait for Ctrl+C, then close the live board streams so open SSE
/// connections do not hold up the graceful shutdown.
async fn shutdown_signal(state: AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, closing board streams");
    state.begin_shutdown();
}

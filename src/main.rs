//! Notes Backend API
//!
//! # Environment Variables
//!
//! - `HOST`: Server host address (default: `0.0.0.0`)
//! - `PORT`: Server port (default: `4000`)
//! - `ENVIRONMENT`: `development` (default) | `staging` | `production`
//! - `STORAGE_MODE`: `in_memory` (default) | `postgres`
//! - `DATABASE_URL`: `PostgreSQL` connection URL (required when `STORAGE_MODE=postgres`)
//! - `DB_MAX_CONNECTIONS`, `DB_ACQUIRE_TIMEOUT_SECS`, `DB_QUERY_TIMEOUT_SECS`: pool and query limits
//! - `WORKER_THREADS`: positive number of tokio worker threads (default: logical CPU count)
//! - `RUST_LOG`: Logging filter (e.g., `info`, `notes_backend_api=debug`)
//! - `LOG_FORMAT`: `text` (default) | `json`

use std::env;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use notes_backend_api::api::{AppConfig, AppState, build_router};
use notes_backend_api::infrastructure::{RepositoryFactory, parse_positive_setting};

const DEFAULT_PORT: u16 = 4000;

/// Builds the runtime, sized by `WORKER_THREADS` when it is set.
///
/// Runs before tracing is initialized, so failures go to stderr.
fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();

    let raw = env::var("WORKER_THREADS").ok();
    match parse_positive_setting("WORKER_THREADS", raw.as_deref()) {
        Ok(Some(threads)) => {
            builder.worker_threads(threads as usize);
        }
        Ok(None) => {}
        Err(error) => {
            eprintln!("Configuration error: {error}");
            std::process::exit(1);
        }
    }

    builder.build()
}

fn main() {
    dotenvy::dotenv().ok();

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("Failed to create tokio runtime: {error}");
            std::process::exit(1);
        }
    };
    runtime.block_on(async_main());
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "notes_backend_api=debug,tower_http=debug".into());

    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    let format_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(format_layer)
        .init();
}

async fn async_main() {
    init_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Notes Backend API");

    let app_config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("Configuration error: {}", error);
            std::process::exit(1);
        }
    };

    let factory = match RepositoryFactory::from_env() {
        Ok(factory) => factory,
        Err(error) => {
            tracing::error!("Configuration error: {}", error);
            std::process::exit(1);
        }
    };

    let repository_config = factory.config();
    tracing::info!(
        environment = %app_config.environment,
        storage_mode = ?repository_config.storage_mode,
        max_connections = repository_config.max_connections,
        query_timeout = ?repository_config.query_timeout,
        "Configuration loaded"
    );

    let repositories = match factory.create().await {
        Ok(repositories) => {
            tracing::info!("Repositories initialized successfully");
            repositories
        }
        Err(error) => {
            tracing::error!("Failed to initialize repositories: {}", error);
            std::process::exit(1);
        }
    };

    let application = build_router(AppState::with_config(repositories, app_config));

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let address: SocketAddr = match format!("{host}:{port}").parse() {
        Ok(address) => address,
        Err(error) => {
            tracing::error!(%error, "Invalid server address: {}:{}", host, port);
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, "Failed to bind to address {}", address);
            std::process::exit(1);
        }
    };

    match listener.local_addr() {
        Ok(address) => tracing::info!("Listening on {}", address),
        Err(error) => tracing::warn!(%error, "Could not determine local address"),
    }

    if let Err(error) = axum::serve(listener, application)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(%error, "Server error");
        std::process::exit(1);
    }

    tracing::info!("Server shutdown complete");
}

/// Completes on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
///
/// In-flight requests are allowed to finish once this resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

//! Folio Ledger - API Server Binary
//!
//! This binary starts the HTTP API server for the folio ledger.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin folio-api
//!
//! # Run against the in-memory ledger
//! API_DATABASE_URL=memory:// cargo run --bin folio-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_DATABASE_URL` - PostgreSQL connection string, or `memory://`
//! * `API_DATABASE__MAX_CONNECTIONS` - Pool size (default: 10)
//! * `API_LEDGER__SETTLEMENT_TOLERANCE` - Largest balance still settled (default: 0.01)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_LOG_FORMAT` - `pretty` or `json` (default: pretty)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_folio::{
    BookingPort, FolioService, HousekeepingPort, InMemoryLedgerStore, LedgerStore,
    MockBookingPort, MockHousekeepingPort,
};
use infra_db::{apply_schema, create_pool, PostgresLedgerStore, PostgresStayAdapter};
use interface_api::config::{ApiConfig, LogFormat};
use interface_api::create_router;

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, wires the ledger adapters,
/// and starts the HTTP server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("Failed to load configuration")?;

    init_tracing(&config.log_level, config.log_format);

    config.validate().context("Invalid configuration")?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        in_memory = config.uses_in_memory_store(),
        "Starting Folio Ledger API Server"
    );

    let service = Arc::new(build_service(&config).await?);
    let app = create_router(service, config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .context("Invalid server address")?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Wires the ledger service to PostgreSQL or in-memory adapters.
async fn build_service(config: &ApiConfig) -> anyhow::Result<FolioService> {
    if config.uses_in_memory_store() {
        tracing::warn!("Using the in-memory ledger; data is lost on shutdown");
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let bookings: Arc<dyn BookingPort> = Arc::new(MockBookingPort::accepting_unknown());
        let housekeeping: Arc<dyn HousekeepingPort> = Arc::new(MockHousekeepingPort::new());
        return Ok(FolioService::new(store, bookings, housekeeping, config.ledger.clone()));
    }

    let pool = create_pool(config.database_config())
        .await
        .context("Failed to connect to database")?;
    if config.database.apply_schema {
        apply_schema(&pool).await.context("Failed to apply schema")?;
    }

    let stays = Arc::new(PostgresStayAdapter::new(pool.clone()));
    let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool));
    let bookings: Arc<dyn BookingPort> = stays.clone();
    let housekeeping: Arc<dyn HousekeepingPort> = stays;

    Ok(FolioService::new(store, bookings, housekeeping, config.ledger.clone()))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

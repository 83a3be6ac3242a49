//! # Harbor API Server
//!
//! Boots the database, the engines and the HTTP router, then serves until
//! Ctrl+C or SIGTERM.

use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use harbor_api::{router, AppState, ServerConfig};
use harbor_db::{Database, DbConfig};
use harbor_engine::{EngineConfig, SyncEngine, TransactionEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting Harbor API server...");

    // Load configuration
    let config = ServerConfig::load()?;
    let engine_config = EngineConfig::load(config.engine_config.clone())?;
    info!(
        addr = %config.bind_addr,
        database = ?config.database_path,
        "Configuration loaded"
    );

    // Open database (migrations run on connect)
    let db_config = DbConfig::new(&config.database_path).max_connections(config.db_max_connections);
    let db = Database::new(db_config)
        .await
        .with_context(|| format!("opening database at {}", config.database_path.display()))?;
    info!("Database ready");

    let engine = TransactionEngine::new(db.clone(), engine_config)?;
    let state = AppState::new(engine);

    let sweeper = spawn_conflict_sweeper(state.sync.clone(), config.cleanup_interval_secs);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Periodically removes resolved conflicts past their retention.
fn spawn_conflict_sweeper(sync: SyncEngine, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            if let Err(e) = sync.sweep_resolved_conflicts().await {
                warn!(error = %e, "Conflict sweep failed");
            }
        }
    })
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

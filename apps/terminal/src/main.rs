//! # Outpost Terminal
//!
//! Headless daemon that keeps a terminal's local store current.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load `TerminalConfig` (defaults → TOML → `OUTPOST_*` env)
//! 3. Open the local store (degraded mode if that fails)
//! 4. Bootstrap the catalog (full on first run, delta afterwards)
//! 5. Start the background scheduler (delta sync + offline replay)
//! 6. Wait for Ctrl+C / SIGTERM, then stop the scheduler and close the store

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use outpost_db::DbConfig;
use outpost_sync::{CatalogSyncOptions, HttpGateway, OfflineCore, SyncEvent, SystemClock, TerminalConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = TerminalConfig::load_or_default(None);
    info!(
        terminal_id = %config.terminal_id(),
        outlet_id = %config.outlet_id(),
        gateway = %config.gateway.base_url,
        "Starting Outpost terminal"
    );

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
    let core = OfflineCore::open(
        DbConfig::new(db_path),
        gateway,
        &config,
        Arc::new(SystemClock),
    )
    .await;

    tokio::spawn(log_events(core.subscribe()));

    let outlet_id = config.outlet_id().to_string();
    match core.sync_catalog(&outlet_id, CatalogSyncOptions::default()).await {
        Ok(outcome) if outcome.paused => {
            warn!(outlet_id = %outlet_id, "Catalog bootstrap paused, server unreachable");
        }
        Ok(outcome) => {
            info!(outlet_id = %outlet_id, mode = %outcome.mode, updated = outcome.updated_count, "Catalog bootstrapped");
        }
        Err(err) => error!(outlet_id = %outlet_id, error = %err, "Catalog bootstrap failed"),
    }

    let scheduler = core.spawn_scheduler(&outlet_id, config.sync.interval());

    shutdown_signal().await;

    scheduler.shutdown().await;
    core.close().await;
    info!("Terminal shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default `info,outpost=debug,sqlx=warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,outpost=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

async fn log_events(mut events: tokio::sync::broadcast::Receiver<SyncEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => debug!(?event, "Sync event"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log lagging"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}

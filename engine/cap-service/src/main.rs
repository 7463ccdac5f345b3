//! Cap Engine Production Service
//!
//! Entry point for the cap accounting and valuation engine. Connects the
//! Postgres ledger store, wires the valuation and reconciliation layers,
//! starts the periodic roster sync, and handles graceful shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use cap_ledger::{PgStats, PgStore};
use cap_service::{initialize_logging, CapEngine, ServiceConfig};
use chrono::Duration;
use roster_sync::{RosterCache, SleeperProvider, SyncScheduler, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging first
    initialize_logging()?;

    info!("Starting Cap Engine Service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ServiceConfig::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    // Connect the ledger store and run migrations
    let store = Arc::new(
        PgStore::connect(&config.database.url)
            .await
            .context("Failed to connect to the ledger database")?,
    );
    let stats = Arc::new(PgStats::new(store.pool().clone()));
    info!("Ledger database connected and migrated");

    // Wire the engine
    let provider = Arc::new(
        SleeperProvider::new(config.provider.clone())
            .context("Failed to build roster provider client")?,
    );
    let cache = RosterCache::new(
        Duration::minutes(config.roster_cache_ttl_minutes),
        Arc::new(SystemClock),
    );
    let engine = Arc::new(CapEngine::new(store, stats, provider, cache));
    info!("Cap engine initialized");

    // Start the periodic roster reconciliation in a separate task
    let scheduler = SyncScheduler::new(config.scheduler.clone(), engine.reconciliation_job());
    let sync_handle = tokio::spawn(async move {
        scheduler.start().await;
    });

    // Wait for shutdown signal
    info!("Cap Engine Service is running. Press Ctrl+C to shutdown gracefully.");
    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received. Stopping roster sync...");
    sync_handle.abort();
    if let Err(e) = sync_handle.await {
        if !e.is_cancelled() {
            error!("Roster sync task ended abnormally: {}", e);
        }
    }

    info!("Cap Engine Service shutdown complete");
    Ok(())
}

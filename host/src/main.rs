//! ==============================================================================
//! main.rs - solvex host entry point
//! ==============================================================================
//!
//! purpose:
//!     polls the Solvex inspection data (latest reading, image, history,
//!     advisory) on a fixed interval and serves the derived dashboard
//!     view-state as json.
//!
//! responsibilities:
//!     - load host.toml (or defaults) and set up logging
//!     - pick the data source: mocks, inspection api, or api with mock fallback
//!     - start the dashboard pollers
//!     - serve the json api until ctrl-c, then stop every poller
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                    rust host (this file)                     │
//!     │  ┌──────────────────┐              ┌─────────────────────┐  │
//!     │  │ dashboard        │              │ web server          │  │
//!     │  │ (4 pollers,      │◄── view() ───│ (port 3000)         │  │
//!     │  │  2 snapshots)    │◄── reload ───│                     │  │
//!     │  └────────┬─────────┘              └─────────────────────┘  │
//!     └───────────┼─────────────────────────────────────────────────┘
//!                 │ InspectionSource
//!        ┌────────┴─────────┐
//!        ▼                  ▼
//!   ┌──────────┐      ┌───────────┐
//!   │ mock     │      │ inspection│
//!   │ data     │      │ http api  │
//!   └──────────┘      └───────────┘
//!
//! ==============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};

use solvex_host::config::HostConfig;
use solvex_host::dashboard::Dashboard;
use solvex_host::{logging, server, source};

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration, then logging at the configured level
    let (config, origin) = HostConfig::load_or_default();
    logging::init_logging(&config.logging.level);

    tracing::info!("===========================================================");
    tracing::info!("  Solvex Inspection Host");
    tracing::info!("===========================================================");
    origin.log();
    config.log_summary();

    // step 2: data source
    let source = source::build_source(&config).context("failed to set up data source")?;

    // step 3: pollers
    let dashboard = Arc::new(
        Dashboard::start(&config.polling, source, config.logging.show_readings)
            .context("failed to start pollers")?,
    );
    tracing::info!(
        "[STARTUP] ✓ Polling latest, image, history, advisory every {} ms",
        config.polling.interval_ms
    );

    // step 4: web server, until ctrl-c
    let addr = config.server.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let served = server::serve(listener, Arc::clone(&dashboard), shutdown_signal()).await;

    // step 5: release timers on every exit path
    dashboard.stop();
    tracing::info!("[SHUTDOWN] Pollers stopped");

    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[SHUTDOWN] Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("[SHUTDOWN] Ctrl-C received");
}

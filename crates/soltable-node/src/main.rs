//! # Soltable Node
//!
//! Entry point: parse flags, install telemetry, open the index and serve
//! until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use soltable_node::{Cli, NodeRuntime};
use soltable_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = cli.into_config();
    config.validate().context("Invalid configuration")?;

    let runtime = Arc::new(NodeRuntime::new(config)?);
    let backfill = runtime.start();

    let signal_runtime = Arc::clone(&runtime);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("[soltable] Ctrl-C received");
                signal_runtime.shutdown();
            }
            Err(e) => warn!("[soltable] Failed to listen for Ctrl-C: {}", e),
        }
    });

    info!("[soltable] Node is running. Press Ctrl+C to stop.");
    let served = runtime.serve().await;
    runtime.shutdown();

    if let Some(handle) = backfill {
        if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
            warn!("[soltable] Backfill task did not stop in time");
        }
    }

    info!("[soltable] Shutdown complete");
    served
}

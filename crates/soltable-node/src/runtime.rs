//! # Node Runtime
//!
//! ## Startup Sequence
//!
//! 1. Open the durable stores (RocksDB column families `records`, `checkpoints`)
//! 2. Build the index service (seeds checkpoints, loads every record)
//! 3. Spawn the backfill task
//! 4. Serve HTTP until shutdown is signalled
//!
//! Backfill is interruptible at any point: its cursor checkpoints let the
//! next run resume where this one stopped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use soltable_index::{
    CheckpointStore, HistoryClient, LedgerClient, LookupTableIndexApi, LookupTableService,
    RecordStore, SolanaRpcClient,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::NodeConfig;
use crate::http::{router, AppState};
use crate::metrics;

/// The node runtime: one index service plus its background tasks.
pub struct NodeRuntime {
    /// Resolved configuration.
    config: NodeConfig,
    /// Index service shared with the HTTP handlers.
    service: Arc<LookupTableService>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeRuntime {
    /// Open the stores and the JSON-RPC client named by `config`.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let (records, checkpoints) = open_stores(&config)?;
        let client =
            Arc::new(SolanaRpcClient::new(&config.rpc).context("Failed to build RPC client")?);
        info!(url = %client.url(), "[soltable] RPC client ready");

        Self::with_ports(config, client.clone(), client, records, checkpoints)
    }

    /// Build the runtime over explicit ports.
    pub fn with_ports(
        config: NodeConfig,
        ledger: Arc<dyn LedgerClient>,
        history: Arc<dyn HistoryClient>,
        records: Arc<dyn RecordStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Result<Self> {
        let service = LookupTableService::new(
            config.index.clone(),
            ledger,
            history,
            records,
            checkpoints,
        )
        .context("Failed to load the lookup table index")?;
        let service = Arc::new(service);
        metrics::refresh_index_gauge(&service);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            service,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Index service.
    pub fn service(&self) -> Arc<LookupTableService> {
        Arc::clone(&self.service)
    }

    /// HTTP router bound to this runtime's service.
    pub fn router(&self) -> axum::Router {
        router(AppState::new(self.service(), self.config.ingest_retry))
    }

    /// Spawn background tasks. Returns the backfill task when one was started.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        info!("===========================================");
        info!("  Soltable Node v{}", crate::VERSION);
        info!("===========================================");
        info!(records = self.service.record_count(), "[soltable] Index ready");

        if !self.config.backfill_on_start {
            info!("[soltable] Startup backfill disabled");
            return None;
        }

        let service = self.service();
        let retry_delay = Duration::from_secs(self.config.backfill_retry_secs);
        let shutdown = self.shutdown_rx.clone();
        Some(tokio::spawn(run_backfill_loop(service, retry_delay, shutdown)))
    }

    /// Serve HTTP until shutdown is signalled.
    pub async fn serve(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.listen_addr))?;
        info!(addr = %self.config.listen_addr, "[soltable] HTTP listening");

        let mut shutdown = self.shutdown_rx.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .context("HTTP server failed")?;

        info!("[soltable] HTTP server stopped");
        Ok(())
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        info!("[soltable] Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("[soltable] Failed to send shutdown signal: {}", e);
        }
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }
}

/// Run backfill until it completes or shutdown is signalled. Any failure
/// restarts the run after `retry_delay`; the cursor checkpoints make the
/// restart resume.
pub async fn run_backfill_loop(
    service: Arc<LookupTableService>,
    retry_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = service.run_backfill() => match result {
                Ok(report) => {
                    metrics::record_backfill(&report);
                    metrics::refresh_index_gauge(&service);
                    info!(
                        pages = report.pages,
                        events = report.events,
                        tables = report.tables_reconciled,
                        "[soltable] Backfill finished"
                    );
                    return;
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        error = %err,
                        retry_in_secs = retry_delay.as_secs(),
                        "[soltable] Backfill interrupted, will resume"
                    );
                }
                Err(err) => {
                    error!(
                        error = %err,
                        retry_in_secs = retry_delay.as_secs(),
                        "[soltable] Backfill failed, will resume"
                    );
                }
            },
            _ = shutdown.changed() => {
                info!("[soltable] Backfill stopped by shutdown");
                return;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(retry_delay) => {}
            _ = shutdown.changed() => {
                info!("[soltable] Backfill stopped by shutdown");
                return;
            }
        }
    }
}

#[cfg(feature = "rocksdb")]
fn open_stores(config: &NodeConfig) -> Result<(Arc<dyn RecordStore>, Arc<dyn CheckpointStore>)> {
    use crate::adapters::storage::{RocksDbConfig, RocksDbStore};

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

    let store = RocksDbStore::open(RocksDbConfig {
        path: config.data_dir.to_string_lossy().to_string(),
        ..RocksDbConfig::default()
    })
    .context("Failed to open RocksDB")?;
    info!(path = %store.path(), "[soltable] RocksDB opened");

    let store = Arc::new(store);
    let records: Arc<dyn RecordStore> = store.clone();
    let checkpoints: Arc<dyn CheckpointStore> = store;
    Ok((records, checkpoints))
}

#[cfg(not(feature = "rocksdb"))]
fn open_stores(_config: &NodeConfig) -> Result<(Arc<dyn RecordStore>, Arc<dyn CheckpointStore>)> {
    use crate::adapters::storage::{InMemoryCheckpointStore, InMemoryRecordStore};

    warn!("[soltable] Built without RocksDB; the index will not survive a restart");
    let records: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
    let checkpoints: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
    Ok((records, checkpoints))
}

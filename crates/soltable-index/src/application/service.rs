//! # Lookup Table Service
//!
//! Application service composing reconciliation, ingestion, backfill and
//! table selection over one shared in-memory index.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::backfill::Backfiller;
use super::ingest::Ingestor;
use super::reconcile::Reconciler;
use crate::algorithms::{dedup_accounts, select_tables};
use crate::config::IndexConfig;
use crate::domain::{
    Address, BackfillReport, CheckpointKey, IndexError, IndexStats, IngestReport,
    MembershipIndex, ReconcileOutcome, ResolveResult, Signature,
};
use crate::ports::{CheckpointStore, HistoryClient, LedgerClient, LookupTableIndexApi, RecordStore};

/// Lookup Table Service - owns the index and everything that mutates it.
pub struct LookupTableService {
    /// Configuration.
    config: IndexConfig,
    /// In-memory mirror of the record store.
    index: Arc<RwLock<MembershipIndex>>,
    /// Single writer path into the index.
    reconciler: Arc<Reconciler>,
    /// Webhook-driven ingestion.
    ingestor: Ingestor,
    /// History scanner.
    backfiller: Backfiller,
    /// Serializes backfill runs.
    backfill_lock: tokio::sync::Mutex<()>,
}

impl LookupTableService {
    /// Create the service, seeding missing checkpoints with null and loading
    /// every stored record into the index.
    pub fn new(
        config: IndexConfig,
        ledger: Arc<dyn LedgerClient>,
        history: Arc<dyn HistoryClient>,
        records: Arc<dyn RecordStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Result<Self, IndexError> {
        seed_checkpoints(checkpoints.as_ref())?;

        let loaded = records.load_all()?;
        let index = MembershipIndex::from_records(loaded);
        info!(
            records = index.len(),
            tables = index.table_count(),
            "[soltable] Index loaded"
        );
        let index = Arc::new(RwLock::new(index));

        let reconciler = Arc::new(Reconciler::new(ledger.clone(), records, index.clone()));
        let ingestor = Ingestor::new(
            ledger.clone(),
            reconciler.clone(),
            config.lookup_table_program,
            config.ingest_consistency,
        );
        let backfiller = Backfiller::new(
            ledger,
            history,
            checkpoints,
            reconciler.clone(),
            config.clone(),
        );

        Ok(Self {
            config,
            index,
            reconciler,
            ingestor,
            backfiller,
            backfill_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Shared handle to the index.
    pub fn index(&self) -> Arc<RwLock<MembershipIndex>> {
        self.index.clone()
    }

    /// Reconcile a single table on demand.
    pub async fn reconcile_table(&self, table: &Address) -> Result<ReconcileOutcome, IndexError> {
        self.reconciler.reconcile(table).await
    }

    /// Number of records in the index.
    pub fn record_count(&self) -> usize {
        self.index.read().len()
    }

    /// Whether a backfill run is in progress.
    pub fn backfill_running(&self) -> bool {
        self.backfill_lock.try_lock().is_err()
    }
}

/// Create every checkpoint register that does not exist yet, holding null.
pub fn seed_checkpoints(checkpoints: &dyn CheckpointStore) -> Result<(), IndexError> {
    for key in CheckpointKey::ALL {
        if !checkpoints.exists(key)? {
            checkpoints.set(key, None)?;
            info!(checkpoint = %key, "[soltable] Seeded empty checkpoint");
        }
    }
    Ok(())
}

#[async_trait]
impl LookupTableIndexApi for LookupTableService {
    async fn ingest_signature(&self, signature: &Signature) -> Result<IngestReport, IndexError> {
        self.ingestor.ingest(signature).await
    }

    async fn run_backfill(&self) -> Result<BackfillReport, IndexError> {
        let _guard = self.backfill_lock.lock().await;
        self.backfiller.run().await.inspect_err(|err| {
            warn!(error = %err, "[soltable] Backfill stopped");
        })
    }

    fn resolve(&self, accounts: &[Address]) -> Result<ResolveResult, IndexError> {
        if accounts.len() > self.config.max_query_accounts {
            return Err(IndexError::TooManyAccounts {
                got: accounts.len(),
                max: self.config.max_query_accounts,
            });
        }
        let distinct = dedup_accounts(accounts);
        Ok(select_tables(&self.index.read(), &distinct))
    }

    fn stats(&self) -> IndexStats {
        self.index.read().stats()
    }
}

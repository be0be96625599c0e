//! # Ingestion
//!
//! Turns one observed transaction into reconciliations of the tables its
//! lookup table instructions touched. The instruction payload only says
//! that a table changed; the resulting membership always comes from the
//! ledger.

use std::sync::Arc;

use tracing::{debug, info};

use super::reconcile::Reconciler;
use crate::domain::{
    Address, Consistency, IndexError, IngestReport, IngestStatus, Signature, touched_tables,
};
use crate::ports::LedgerClient;

/// Single-signature ingestion pipeline.
pub struct Ingestor {
    ledger: Arc<dyn LedgerClient>,
    reconciler: Arc<Reconciler>,
    program_id: Address,
    consistency: Consistency,
}

impl Ingestor {
    /// Create an ingestor reading transactions at `consistency`.
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        reconciler: Arc<Reconciler>,
        program_id: Address,
        consistency: Consistency,
    ) -> Self {
        Self {
            ledger,
            reconciler,
            program_id,
            consistency,
        }
    }

    /// Ingest `signature`.
    ///
    /// Each distinct touched table is reconciled once, in first-seen order.
    /// The first reconciliation error aborts the rest; re-ingesting is safe.
    pub async fn ingest(&self, signature: &Signature) -> Result<IngestReport, IndexError> {
        let tx = self
            .ledger
            .get_transaction(signature, self.consistency)
            .await?
            .ok_or_else(|| IndexError::NotReady {
                signature: signature.clone(),
            })?;

        if tx.failed {
            debug!(signature = %signature, "[soltable] Skipping failed transaction");
            return Ok(IngestReport {
                signature: signature.clone(),
                status: IngestStatus::SkippedFailedTransaction,
                outcomes: Vec::new(),
            });
        }

        let tables = touched_tables(&tx, &self.program_id);
        let mut outcomes = Vec::with_capacity(tables.len());
        for table in &tables {
            outcomes.push(self.reconciler.reconcile(table).await?);
        }

        if !tables.is_empty() {
            info!(
                signature = %signature,
                tables = tables.len(),
                "[soltable] Ingested lookup table transaction"
            );
        }

        Ok(IngestReport {
            signature: signature.clone(),
            status: IngestStatus::Applied,
            outcomes,
        })
    }
}

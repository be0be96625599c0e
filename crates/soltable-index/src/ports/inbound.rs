//! # Inbound Ports
//!
//! API trait defining what the lookup table index can do.

use async_trait::async_trait;

use crate::domain::{
    Address, BackfillReport, IndexError, IndexStats, IngestReport, ResolveResult, Signature,
};

/// Lookup table index API - inbound port.
#[async_trait]
pub trait LookupTableIndexApi: Send + Sync {
    /// Ingest one observed transaction.
    ///
    /// Returns [`IndexError::NotReady`] when the ledger cannot serve the
    /// transaction yet. There is no internal retry.
    async fn ingest_signature(&self, signature: &Signature) -> Result<IngestReport, IndexError>;

    /// Walk program history back to the last checkpoint, reconciling every
    /// table it touches. Resumable after interruption.
    async fn run_backfill(&self) -> Result<BackfillReport, IndexError>;

    /// Tables covering `accounts`, greedily chosen. More entries than the
    /// query bound, duplicates included, is `TooManyAccounts`.
    fn resolve(&self, accounts: &[Address]) -> Result<ResolveResult, IndexError>;

    /// Current index statistics.
    fn stats(&self) -> IndexStats;
}

//! # Soltable Index
//!
//! Derived index of Solana Address Lookup Table membership, and a greedy
//! resolver that compresses a set of accounts into the tables covering them.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Observe lookup table mutations (extend, deactivate), one signature at a time
//! - Backfill the full program history with crash-safe checkpoints
//! - Reconcile each touched table against its on-chain account
//! - Answer "which tables cover these accounts" from memory
//!
//! ## Consistency
//!
//! | Path | Lock |
//! |------|------|
//! | Resolver, stats | Shared read lock on the index |
//! | Reconciliation | Per-table gate, then short write locks |
//! | Ledger / history I/O | No lock held |
//!
//! ## Module Structure
//!
//! ```text
//! soltable-index/
//! ├── domain/          # Address, MembershipIndex, instruction + account codecs, errors
//! ├── algorithms/      # Greedy table selection, per-batch table discovery
//! ├── ports/           # API trait (inbound) + ledger/history/store traits (outbound)
//! ├── application/     # Reconciler, Ingestor, Backfiller, LookupTableService
//! ├── adapters/        # Solana JSON-RPC client
//! └── config.rs        # IndexConfig, RpcConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::SolanaRpcClient;
pub use algorithms::{select_tables, tables_in_batch, MIN_CANDIDATE_TALLY};
pub use application::{Backfiller, Ingestor, LookupTableService, Reconciler};
pub use config::{IndexConfig, RpcConfig, DEFAULT_MAX_QUERY_ACCOUNTS};
pub use domain::{
    Address, BackfillReport, CheckpointKey, Consistency, HistoryEvent, IndexError, IndexStats,
    IngestReport, IngestStatus, LookupTableInstruction, MembershipIndex, MembershipRecord,
    ParsedTransaction, ReconcileOutcome, ResolveResult, Signature, TableState,
    TransactionInstruction, LOOKUP_TABLE_PROGRAM_ID,
};
pub use ports::{
    CheckpointStore, HistoryClient, InMemoryCheckpointStore, InMemoryRecordStore, LedgerClient,
    LookupTableIndexApi, MockHistory, MockLedger, RecordStore, StoreError,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Domain Entities
//!
//! Membership records, authoritative table state, parsed transactions and
//! the reports produced by ingestion, backfill and table selection.

use serde::{Deserialize, Serialize};

use super::value_objects::{Address, Signature};

/// "`account` is listed as a member of `table`".
///
/// At most one record exists per `(table, account)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MembershipRecord {
    /// Lookup table address.
    pub table: Address,
    /// Member account address.
    pub account: Address,
}

impl MembershipRecord {
    /// Create a record.
    pub fn new(table: Address, account: Address) -> Self {
        Self { table, account }
    }
}

/// Authoritative on-chain state of a lookup table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableState {
    /// Table address.
    pub address: Address,
    /// False once the table has been deactivated.
    pub is_active: bool,
    /// Member accounts in on-chain order.
    pub members: Vec<Address>,
}

impl TableState {
    /// Active table with the given members.
    pub fn active(address: Address, members: Vec<Address>) -> Self {
        Self {
            address,
            is_active: true,
            members,
        }
    }

    /// Deactivated table. Members are irrelevant once inactive.
    pub fn inactive(address: Address) -> Self {
        Self {
            address,
            is_active: false,
            members: Vec::new(),
        }
    }
}

/// One top-level instruction with its account indices already resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInstruction {
    /// Invoked program.
    pub program_id: Address,
    /// Referenced accounts, in instruction order.
    pub accounts: Vec<Address>,
    /// Raw instruction data.
    pub data: Vec<u8>,
}

/// A transaction as returned by the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedTransaction {
    /// Transaction signature.
    pub signature: Signature,
    /// Slot the transaction landed in.
    pub slot: u64,
    /// True when the transaction completed with an on-chain error.
    pub failed: bool,
    /// Top-level instructions.
    pub instructions: Vec<TransactionInstruction>,
}

/// One entry of the program's transaction history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Transaction signature (also the pagination cursor).
    pub signature: Signature,
    /// Slot of the transaction.
    pub slot: u64,
    /// True when the transaction failed on-chain.
    pub failed: bool,
}

impl HistoryEvent {
    /// Successful history entry.
    pub fn new(signature: impl Into<Signature>, slot: u64) -> Self {
        Self {
            signature: signature.into(),
            slot,
            failed: false,
        }
    }
}

/// Answer to a table-selection query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResult {
    /// Selected tables, in selection order.
    pub selected_tables: Vec<Address>,
    /// Accounts covered by the selected tables, in the order they were claimed.
    pub matched_accounts: Vec<Address>,
}

/// Index statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Number of membership records.
    pub total_records: usize,
    /// Number of distinct tables with at least one record.
    pub distinct_tables: usize,
    /// `(total_records - distinct_accounts) / total_records`, 0 when empty.
    pub duplicate_ratio: f64,
}

/// Result of reconciling one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Active table; `added` records were inserted (possibly zero).
    Extended {
        /// Table address
        table: Address,
        /// Newly inserted records
        added: usize,
    },
    /// Inactive or missing table; `removed` records were deleted.
    Removed {
        /// Table address
        table: Address,
        /// Deleted records
        removed: usize,
    },
    /// A newer reconciliation of the same table was applied first.
    Superseded {
        /// Table address
        table: Address,
    },
}

impl ReconcileOutcome {
    /// Table this outcome refers to.
    pub fn table(&self) -> Address {
        match self {
            ReconcileOutcome::Extended { table, .. }
            | ReconcileOutcome::Removed { table, .. }
            | ReconcileOutcome::Superseded { table } => *table,
        }
    }

    /// Whether any record was inserted or deleted.
    pub fn mutated(&self) -> bool {
        match self {
            ReconcileOutcome::Extended { added, .. } => *added > 0,
            ReconcileOutcome::Removed { removed, .. } => *removed > 0,
            ReconcileOutcome::Superseded { .. } => false,
        }
    }

    /// Short label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Extended { .. } => "extended",
            ReconcileOutcome::Removed { .. } => "removed",
            ReconcileOutcome::Superseded { .. } => "superseded",
        }
    }
}

/// What ingestion did with a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestStatus {
    /// Lookup table instructions were examined and their tables reconciled.
    Applied,
    /// The transaction failed on-chain; nothing to do.
    SkippedFailedTransaction,
}

/// Report for one ingested signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestReport {
    /// Ingested signature.
    pub signature: Signature,
    /// Overall status.
    pub status: IngestStatus,
    /// One outcome per distinct table reconciled.
    pub outcomes: Vec<ReconcileOutcome>,
}

/// Summary of a backfill run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// History pages processed.
    pub pages: usize,
    /// History events examined.
    pub events: usize,
    /// Table reconciliations performed (counted once per page per table).
    pub tables_reconciled: usize,
    /// `LAST_SEEN_CURSOR` after the run.
    pub last_seen_cursor: Option<Signature>,
}

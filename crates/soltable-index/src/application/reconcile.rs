//! # Reconciliation
//!
//! Folds a table's authoritative ledger state into the index and the record
//! store.
//!
//! ## Ordering
//!
//! Every call draws a ticket from the table's [`TableGate`] before fetching
//! state, and applies under the gate's mutex. A call whose ticket is older
//! than the last applied ticket fetched its state earlier than a result
//! already applied, so it is dropped as [`ReconcileOutcome::Superseded`].
//! No lock is held while the ledger is queried. A removed table's gate is
//! dropped once no other call holds it.
//!
//! ## Write-through
//!
//! The store is written before the in-memory index, record by record, so a
//! failed write never leaves the index ahead of the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::domain::{Address, IndexError, MembershipIndex, MembershipRecord, ReconcileOutcome, TableState};
use crate::ports::{LedgerClient, RecordStore};

/// Per-table serialization point.
#[derive(Debug, Default)]
pub struct TableGate {
    next_ticket: AtomicU64,
    applied: Mutex<u64>,
}

impl TableGate {
    /// Draw the next ticket. Tickets start at 1 and only grow.
    pub fn draw(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last applied ticket (0 if none).
    pub fn applied(&self) -> u64 {
        *self.applied.lock()
    }
}

/// Reconciles tables against the ledger.
pub struct Reconciler {
    ledger: Arc<dyn LedgerClient>,
    records: Arc<dyn RecordStore>,
    index: Arc<RwLock<MembershipIndex>>,
    gates: DashMap<Address, Arc<TableGate>>,
}

impl Reconciler {
    /// Create a reconciler writing to `records` and `index`.
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        records: Arc<dyn RecordStore>,
        index: Arc<RwLock<MembershipIndex>>,
    ) -> Self {
        Self {
            ledger,
            records,
            index,
            gates: DashMap::new(),
        }
    }

    /// Gate for `table`, created on first use.
    pub fn gate(&self, table: &Address) -> Arc<TableGate> {
        self.gates.entry(*table).or_default().clone()
    }

    /// Number of tables with a live gate.
    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    /// Fetch `table` from the ledger and make the index match it.
    pub async fn reconcile(&self, table: &Address) -> Result<ReconcileOutcome, IndexError> {
        let gate = self.gate(table);
        let ticket = gate.draw();

        let state = self.ledger.get_table_state(table).await?;

        let outcome = self.apply(&gate, ticket, table, state.as_ref())?;
        if matches!(outcome, ReconcileOutcome::Removed { .. }) {
            // Only when the map and this call are the sole holders
            self.gates.remove_if(table, |_, held| {
                Arc::ptr_eq(held, &gate) && Arc::strong_count(held) == 2
            });
        }
        Ok(outcome)
    }

    /// Apply a fetched state under the gate. `state == None` means absent.
    pub fn apply(
        &self,
        gate: &TableGate,
        ticket: u64,
        table: &Address,
        state: Option<&TableState>,
    ) -> Result<ReconcileOutcome, IndexError> {
        let mut applied = gate.applied.lock();
        if *applied > ticket {
            debug!(
                table = %table,
                ticket,
                applied = *applied,
                "[soltable] Dropping stale table state"
            );
            return Ok(ReconcileOutcome::Superseded { table: *table });
        }

        let outcome = match state {
            Some(state) if state.is_active => self.extend(table, &state.members)?,
            _ => self.remove(table)?,
        };
        *applied = ticket;

        if outcome.mutated() {
            info!(table = %table, outcome = outcome.label(), "[soltable] Table reconciled");
        } else {
            debug!(table = %table, outcome = outcome.label(), "[soltable] Table already in sync");
        }
        Ok(outcome)
    }

    fn extend(&self, table: &Address, members: &[Address]) -> Result<ReconcileOutcome, IndexError> {
        let missing: Vec<MembershipRecord> = {
            let index = self.index.read();
            let mut missing: Vec<MembershipRecord> = Vec::new();
            for account in members {
                let record = MembershipRecord::new(*table, *account);
                if !index.contains(&record) && !missing.contains(&record) {
                    missing.push(record);
                }
            }
            missing
        };

        let mut added = 0;
        for record in &missing {
            self.records.upsert(record)?;
            if self.index.write().insert(*record) {
                added += 1;
            }
        }

        Ok(ReconcileOutcome::Extended {
            table: *table,
            added,
        })
    }

    fn remove(&self, table: &Address) -> Result<ReconcileOutcome, IndexError> {
        self.records.delete_all_for_table(table)?;
        let removed = self.index.write().remove_table(table);
        Ok(ReconcileOutcome::Removed {
            table: *table,
            removed,
        })
    }
}

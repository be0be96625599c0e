//! # Outbound Ports
//!
//! Traits for external dependencies: the ledger, the program history feed
//! and the two durable stores.
//!
//! The stores are synchronous: they are local, fast, and are called while
//! the per-table gate is held, which must never span an `.await`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::domain::{
    Address, CheckpointKey, Consistency, HistoryEvent, IndexError, MembershipRecord,
    ParsedTransaction, Signature, TableState,
};

/// Ledger access - outbound port.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch a transaction. `Ok(None)` means the ledger cannot serve it at
    /// this consistency level yet.
    async fn get_transaction(
        &self,
        signature: &Signature,
        consistency: Consistency,
    ) -> Result<Option<ParsedTransaction>, IndexError>;

    /// Fetch a table's authoritative state. `Ok(None)` means the account
    /// does not exist or is not an initialized lookup table.
    async fn get_table_state(&self, table: &Address) -> Result<Option<TableState>, IndexError>;
}

/// Program history feed - outbound port.
#[async_trait]
pub trait HistoryClient: Send + Sync {
    /// Events of `program`, newest first, strictly older than `before` and
    /// strictly newer than `until`. An empty page ends a scan.
    async fn list_events(
        &self,
        program: &Address,
        before: Option<&Signature>,
        until: Option<&Signature>,
        limit: usize,
    ) -> Result<Vec<HistoryEvent>, IndexError>;
}

/// Durable store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Stored bytes could not be decoded.
    #[error("Corrupt entry: {0}")]
    Corrupt(String),
}

impl From<StoreError> for IndexError {
    fn from(err: StoreError) -> Self {
        IndexError::Storage(err.to_string())
    }
}

/// Membership record store - outbound port.
pub trait RecordStore: Send + Sync {
    /// Every stored record.
    fn load_all(&self) -> Result<Vec<MembershipRecord>, StoreError>;

    /// Insert a record if absent. Inserting an existing record is a no-op.
    fn upsert(&self, record: &MembershipRecord) -> Result<(), StoreError>;

    /// Delete every record of `table`. Returns the number deleted.
    fn delete_all_for_table(&self, table: &Address) -> Result<usize, StoreError>;
}

/// Checkpoint register store - outbound port.
pub trait CheckpointStore: Send + Sync {
    /// Whether the register exists (even if it holds null).
    fn exists(&self, key: CheckpointKey) -> Result<bool, StoreError>;

    /// Current cursor. Missing and null registers both read as `None`.
    fn get(&self, key: CheckpointKey) -> Result<Option<Signature>, StoreError>;

    /// Overwrite the register.
    fn set(&self, key: CheckpointKey, cursor: Option<&Signature>) -> Result<(), StoreError>;
}

// =============================================================================
// In-Memory Implementations
// =============================================================================

/// In-memory record store.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<BTreeSet<MembershipRecord>>,
    fail_writes: AtomicBool,
}

impl InMemoryRecordStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `records`.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = MembershipRecord>,
    {
        let store = Self::new();
        store.records.lock().extend(records);
        store
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io("write rejected".to_string()));
        }
        Ok(())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load_all(&self) -> Result<Vec<MembershipRecord>, StoreError> {
        Ok(self.records.lock().iter().copied().collect())
    }

    fn upsert(&self, record: &MembershipRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.records.lock().insert(*record);
        Ok(())
    }

    fn delete_all_for_table(&self, table: &Address) -> Result<usize, StoreError> {
        self.check_writable()?;
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|record| record.table != *table);
        Ok(before - records.len())
    }
}

/// In-memory checkpoint store. Keeps a log of every successful write.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    registers: Mutex<HashMap<CheckpointKey, Option<Signature>>>,
    writes: Mutex<Vec<(CheckpointKey, Option<Signature>)>>,
    fail_writes: AtomicBool,
}

impl InMemoryCheckpointStore {
    /// Empty store with no registers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `set` call so far, in order.
    pub fn writes(&self) -> Vec<(CheckpointKey, Option<Signature>)> {
        self.writes.lock().clone()
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn exists(&self, key: CheckpointKey) -> Result<bool, StoreError> {
        Ok(self.registers.lock().contains_key(&key))
    }

    fn get(&self, key: CheckpointKey) -> Result<Option<Signature>, StoreError> {
        Ok(self.registers.lock().get(&key).cloned().flatten())
    }

    fn set(&self, key: CheckpointKey, cursor: Option<&Signature>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io("checkpoint write rejected".to_string()));
        }
        self.registers.lock().insert(key, cursor.cloned());
        self.writes.lock().push((key, cursor.cloned()));
        Ok(())
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock ledger backed by in-memory maps.
#[derive(Default)]
pub struct MockLedger {
    transactions: Mutex<HashMap<Signature, ParsedTransaction>>,
    tables: Mutex<HashMap<Address, TableState>>,
    not_ready: Mutex<HashSet<Signature>>,
    undecodable: Mutex<HashSet<Address>>,
    should_fail: AtomicBool,
    table_fetches: AtomicUsize,
}

impl MockLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a transaction available.
    pub fn insert_transaction(&self, tx: ParsedTransaction) {
        self.not_ready.lock().remove(&tx.signature);
        self.transactions.lock().insert(tx.signature.clone(), tx);
    }

    /// Report `signature` as not ready until it is inserted.
    pub fn mark_not_ready(&self, signature: impl Into<Signature>) {
        self.not_ready.lock().insert(signature.into());
    }

    /// Set the authoritative state of a table.
    pub fn set_table(&self, state: TableState) {
        self.tables.lock().insert(state.address, state);
    }

    /// Make a table account disappear.
    pub fn remove_table(&self, table: &Address) {
        self.tables.lock().remove(table);
    }

    /// Serve `table` as an account whose data cannot be decoded.
    pub fn mark_undecodable(&self, table: Address) {
        self.undecodable.lock().insert(table);
    }

    /// Make every call fail with `UpstreamUnavailable` (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_table_state` calls served.
    pub fn table_fetches(&self) -> usize {
        self.table_fetches.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), IndexError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(IndexError::UpstreamUnavailable("Mock failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_transaction(
        &self,
        signature: &Signature,
        _consistency: Consistency,
    ) -> Result<Option<ParsedTransaction>, IndexError> {
        self.check_available()?;
        if self.not_ready.lock().contains(signature) {
            return Ok(None);
        }
        Ok(self.transactions.lock().get(signature).cloned())
    }

    async fn get_table_state(&self, table: &Address) -> Result<Option<TableState>, IndexError> {
        self.check_available()?;
        self.table_fetches.fetch_add(1, Ordering::SeqCst);
        if self.undecodable.lock().contains(table) {
            return Err(IndexError::Decode(format!("malformed table account {table}")));
        }
        Ok(self.tables.lock().get(table).cloned())
    }
}

/// Mock history feed over a fixed newest-first event list.
#[derive(Default)]
pub struct MockHistory {
    events: Mutex<Vec<HistoryEvent>>,
    calls: AtomicUsize,
    fail_from_call: Mutex<Option<usize>>,
}

impl MockHistory {
    /// Feed over `events`, which must be newest first.
    pub fn new(events: Vec<HistoryEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Self::default()
        }
    }

    /// Prepend newer events, as if they landed after construction.
    pub fn push_newer(&self, newer: Vec<HistoryEvent>) {
        let mut events = self.events.lock();
        let older = std::mem::take(&mut *events);
        *events = newer.into_iter().chain(older).collect();
    }

    /// Fail every call numbered `n` or later (0-based). `None` disables.
    pub fn fail_from_call(&self, n: Option<usize>) {
        *self.fail_from_call.lock() = n;
    }

    /// Number of `list_events` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryClient for MockHistory {
    async fn list_events(
        &self,
        _program: &Address,
        before: Option<&Signature>,
        until: Option<&Signature>,
        limit: usize,
    ) -> Result<Vec<HistoryEvent>, IndexError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_from_call.lock().is_some_and(|n| call >= n) {
            return Err(IndexError::UpstreamUnavailable("Mock failure".to_string()));
        }

        let events = self.events.lock();
        let position = |sig: &Signature| events.iter().position(|e| &e.signature == sig);

        let start = match before {
            Some(sig) => match position(sig) {
                Some(idx) => idx + 1,
                None => return Ok(Vec::new()),
            },
            None => 0,
        };
        let end = until.and_then(position).unwrap_or(events.len());

        if start >= end {
            return Ok(Vec::new());
        }
        Ok(events[start..end].iter().take(limit).cloned().collect())
    }
}

//! Shared fixtures: a chain history where event `eN` extends table `100+N`
//! with accounts `N` and `N+1`.

use std::sync::Arc;

use soltable_index::domain::{OPCODE_DEACTIVATE, OPCODE_EXTEND};
use soltable_index::{
    Address, CheckpointStore, HistoryEvent, IndexConfig, LookupTableService, MockHistory,
    MockLedger, ParsedTransaction, RecordStore, Signature, TableState, TransactionInstruction,
    LOOKUP_TABLE_PROGRAM_ID,
};

/// Address made of one repeated byte.
pub fn addr(n: u8) -> Address {
    Address::new([n; 32])
}

/// Table touched by event `n`.
pub fn table_of(n: u8) -> Address {
    addr(100 + n)
}

/// Transaction with one lookup table instruction.
pub fn lookup_tx(signature: &str, table: Address, opcode: u32) -> ParsedTransaction {
    ParsedTransaction {
        signature: Signature::new(signature),
        slot: 1,
        failed: false,
        instructions: vec![TransactionInstruction {
            program_id: LOOKUP_TABLE_PROGRAM_ID,
            accounts: vec![table],
            data: opcode.to_le_bytes().to_vec(),
        }],
    }
}

/// Extend instruction on `table`.
pub fn extend_tx(signature: &str, table: Address) -> ParsedTransaction {
    lookup_tx(signature, table, OPCODE_EXTEND)
}

/// Deactivate instruction on `table`.
pub fn deactivate_tx(signature: &str, table: Address) -> ParsedTransaction {
    lookup_tx(signature, table, OPCODE_DEACTIVATE)
}

/// Make event `eN` available on the ledger, with its table active.
pub fn add_event(ledger: &MockLedger, n: u8) -> HistoryEvent {
    let signature = format!("e{}", n);
    ledger.set_table(TableState::active(table_of(n), vec![addr(n), addr(n + 1)]));
    ledger.insert_transaction(extend_tx(&signature, table_of(n)));
    HistoryEvent::new(signature, n as u64)
}

/// Ledger plus a history of events `e1..=eN`, newest first.
pub fn chain(n: u8) -> (Arc<MockLedger>, Arc<MockHistory>) {
    let ledger = Arc::new(MockLedger::new());
    let mut events: Vec<HistoryEvent> = (1..=n).map(|i| add_event(&ledger, i)).collect();
    events.reverse();
    (ledger, Arc::new(MockHistory::new(events)))
}

/// Service with small pages and no page delay.
pub fn service(
    ledger: Arc<MockLedger>,
    history: Arc<MockHistory>,
    records: Arc<dyn RecordStore>,
    checkpoints: Arc<dyn CheckpointStore>,
) -> LookupTableService {
    match LookupTableService::new(IndexConfig::for_testing(), ledger, history, records, checkpoints)
    {
        Ok(service) => service,
        Err(e) => panic!("service construction failed: {}", e),
    }
}

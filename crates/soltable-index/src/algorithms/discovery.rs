//! # Table Discovery
//!
//! Collects the distinct tables implicated by a batch of transactions so
//! each one is reconciled once per batch, not once per instruction.

use crate::domain::{touched_tables, Address, ParsedTransaction};

/// Distinct tables touched by successful transactions, in first-seen order.
pub fn tables_in_batch<'a, I>(transactions: I, program_id: &Address) -> Vec<Address>
where
    I: IntoIterator<Item = &'a ParsedTransaction>,
{
    let mut tables: Vec<Address> = Vec::new();
    for tx in transactions {
        if tx.failed {
            continue;
        }
        for table in touched_tables(tx, program_id) {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
    }
    tables
}

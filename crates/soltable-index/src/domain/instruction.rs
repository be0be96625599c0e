//! # Lookup Table Instructions
//!
//! Closed decoding of Address Lookup Table program instructions. The opcode
//! is the first 4 bytes of instruction data, little-endian.

use super::entities::{ParsedTransaction, TransactionInstruction};
use super::value_objects::{Address, LOOKUP_TABLE_PROGRAM_ID};

/// `ExtendLookupTable` opcode.
pub const OPCODE_EXTEND: u32 = 2;

/// `DeactivateLookupTable` opcode.
pub const OPCODE_DEACTIVATE: u32 = 3;

/// Decoded lookup table instruction kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupTableInstruction {
    /// Members were appended.
    Extend,
    /// The table was retired.
    Deactivate,
    /// Create, freeze, close, or data too short to carry an opcode.
    Other(Option<u32>),
}

impl LookupTableInstruction {
    /// Decode the opcode from raw instruction data.
    pub fn decode(data: &[u8]) -> Self {
        let Some(opcode) = data
            .get(..4)
            .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
            .map(u32::from_le_bytes)
        else {
            return LookupTableInstruction::Other(None);
        };

        match opcode {
            OPCODE_EXTEND => LookupTableInstruction::Extend,
            OPCODE_DEACTIVATE => LookupTableInstruction::Deactivate,
            other => LookupTableInstruction::Other(Some(other)),
        }
    }

    /// Whether this instruction can change table membership.
    pub fn mutates_membership(&self) -> bool {
        matches!(
            self,
            LookupTableInstruction::Extend | LookupTableInstruction::Deactivate
        )
    }
}

/// Table touched by a single instruction, if it is an extend/deactivate
/// addressed to `program_id`. The table is the first referenced account.
pub fn touched_table(ix: &TransactionInstruction, program_id: &Address) -> Option<Address> {
    if ix.program_id != *program_id {
        return None;
    }
    if !LookupTableInstruction::decode(&ix.data).mutates_membership() {
        return None;
    }
    ix.accounts.first().copied()
}

/// Distinct tables touched by a transaction, in first-seen order.
pub fn touched_tables(tx: &ParsedTransaction, program_id: &Address) -> Vec<Address> {
    let mut tables = Vec::new();
    for ix in &tx.instructions {
        if let Some(table) = touched_table(ix, program_id) {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
    }
    tables
}

/// Same as [`touched_tables`] using the canonical program id.
pub fn touched_lookup_tables(tx: &ParsedTransaction) -> Vec<Address> {
    touched_tables(tx, &LOOKUP_TABLE_PROGRAM_ID)
}

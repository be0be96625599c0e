//! # Lookup Table Account Codec
//!
//! Decodes the raw account data of an Address Lookup Table into a
//! [`TableState`].
//!
//! ```text
//! offset  size  field
//! 0       4     type discriminator (u32 LE, 1 = lookup table)
//! 4       8     deactivation slot (u64 LE, u64::MAX = active)
//! 12      8     last extended slot
//! 20      1     last extended slot start index
//! 21      33    authority (Option<Pubkey>: tag + key)
//! 54      2     padding
//! 56      32*n  addresses
//! ```

use super::entities::TableState;
use super::errors::IndexError;
use super::value_objects::{Address, ADDRESS_LEN};

/// Size of the serialized table metadata preceding the address list.
pub const LOOKUP_TABLE_META_SIZE: usize = 56;

/// Deactivation slot value of a table that was never deactivated.
pub const ACTIVE_DEACTIVATION_SLOT: u64 = u64::MAX;

const DISCRIMINATOR_UNINITIALIZED: u32 = 0;
const DISCRIMINATOR_LOOKUP_TABLE: u32 = 1;

/// Decoded table metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupTableMeta {
    /// Slot at which deactivation was requested.
    pub deactivation_slot: u64,
    /// Slot of the most recent extend.
    pub last_extended_slot: u64,
    /// Address index at which the most recent extend started.
    pub last_extended_slot_start_index: u8,
    /// Table authority; `None` once frozen.
    pub authority: Option<Address>,
}

impl LookupTableMeta {
    /// Whether the table is still active.
    pub fn is_active(&self) -> bool {
        self.deactivation_slot == ACTIVE_DEACTIVATION_SLOT
    }
}

/// Decode raw account data.
///
/// Returns `Ok(None)` for uninitialized accounts. Errors on truncated
/// metadata, unknown discriminators and a ragged address region.
pub fn decode_lookup_table(
    data: &[u8],
) -> Result<Option<(LookupTableMeta, Vec<Address>)>, IndexError> {
    if data.len() < LOOKUP_TABLE_META_SIZE {
        return Err(IndexError::Decode(format!(
            "lookup table data too short: {} < {}",
            data.len(),
            LOOKUP_TABLE_META_SIZE
        )));
    }

    let discriminator = read_u32(data, 0);
    match discriminator {
        DISCRIMINATOR_UNINITIALIZED => return Ok(None),
        DISCRIMINATOR_LOOKUP_TABLE => {}
        other => {
            return Err(IndexError::Decode(format!(
                "unknown lookup table discriminator {}",
                other
            )))
        }
    }

    let authority = match data[21] {
        0 => None,
        1 => Some(Address::from_slice(&data[22..54])?),
        tag => {
            return Err(IndexError::Decode(format!(
                "invalid authority option tag {}",
                tag
            )))
        }
    };

    let meta = LookupTableMeta {
        deactivation_slot: read_u64(data, 4),
        last_extended_slot: read_u64(data, 12),
        last_extended_slot_start_index: data[20],
        authority,
    };

    let region = &data[LOOKUP_TABLE_META_SIZE..];
    if region.len() % ADDRESS_LEN != 0 {
        return Err(IndexError::Decode(format!(
            "address region length {} is not a multiple of {}",
            region.len(),
            ADDRESS_LEN
        )));
    }

    let addresses = region
        .chunks_exact(ADDRESS_LEN)
        .map(Address::from_slice)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some((meta, addresses)))
}

/// Decode raw account data straight into a [`TableState`].
pub fn decode_table_state(address: Address, data: &[u8]) -> Result<Option<TableState>, IndexError> {
    Ok(decode_lookup_table(data)?.map(|(meta, members)| TableState {
        address,
        is_active: meta.is_active(),
        members,
    }))
}

/// Encode a table account. Inverse of [`decode_lookup_table`]; used by mock
/// ledgers and tests.
pub fn encode_lookup_table(meta: &LookupTableMeta, addresses: &[Address]) -> Vec<u8> {
    let mut data = Vec::with_capacity(LOOKUP_TABLE_META_SIZE + addresses.len() * ADDRESS_LEN);
    data.extend_from_slice(&DISCRIMINATOR_LOOKUP_TABLE.to_le_bytes());
    data.extend_from_slice(&meta.deactivation_slot.to_le_bytes());
    data.extend_from_slice(&meta.last_extended_slot.to_le_bytes());
    data.push(meta.last_extended_slot_start_index);
    match meta.authority {
        Some(authority) => {
            data.push(1);
            data.extend_from_slice(authority.as_bytes());
        }
        None => {
            data.push(0);
            data.extend_from_slice(&[0u8; ADDRESS_LEN]);
        }
    }
    data.extend_from_slice(&[0u8; 2]);
    for address in addresses {
        data.extend_from_slice(address.as_bytes());
    }
    data
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

//! # Storage Adapters
//!
//! Durable backends for the record and checkpoint ports.
//!
//! Enable the `rocksdb` feature (on by default) for the RocksDB store.
//! Without it the node falls back to the in-memory stores shipped with
//! `soltable-index`, which lose everything on restart.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{
    RocksDbConfig, RocksDbStore, CF_CHECKPOINTS, CF_RECORDS, COLUMN_FAMILIES,
};

pub use soltable_index::{InMemoryCheckpointStore, InMemoryRecordStore};

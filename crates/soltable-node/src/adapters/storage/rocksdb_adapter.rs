//! # RocksDB Storage Adapter
//!
//! Durable implementation of the record store and checkpoint store ports.
//!
//! ## Column Families
//!
//! - `records` - key `table(32) || account(32)`, empty value
//! - `checkpoints` - key = checkpoint name, value = cursor bytes (empty = null)
//!
//! Records of one table share a 32-byte key prefix, so deleting a table is a
//! prefix scan plus one batch delete.

use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use soltable_index::{
    Address, CheckpointKey, CheckpointStore, MembershipRecord, RecordStore, Signature, StoreError,
};
use std::sync::Arc;

/// Membership records
pub const CF_RECORDS: &str = "records";
/// Backfill checkpoints
pub const CF_CHECKPOINTS: &str = "checkpoints";

/// All column families used by the node
pub const COLUMN_FAMILIES: &[&str] = &[CF_RECORDS, CF_CHECKPOINTS];

const RECORD_KEY_LEN: usize = 64;

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/soltable".to_string(),
            block_cache_size: 64 * 1024 * 1024,  // 64MB
            write_buffer_size: 16 * 1024 * 1024, // 16MB
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,  // 8MB
            write_buffer_size: 4 * 1024 * 1024, // 4MB
            sync_writes: false,
        }
    }
}

/// RocksDB-backed record and checkpoint store
pub struct RocksDbStore {
    db: Arc<RwLock<DB>>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create the database with its column families
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        // Bloom filter for faster lookups
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| StoreError::Io(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            config,
        })
    }

    /// Database directory
    pub fn path(&self) -> &str {
        &self.config.path
    }

    fn write_opts(&self) -> rocksdb::WriteOptions {
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }

    fn record_key(record: &MembershipRecord) -> [u8; RECORD_KEY_LEN] {
        let mut key = [0u8; RECORD_KEY_LEN];
        key[..32].copy_from_slice(record.table.as_bytes());
        key[32..].copy_from_slice(record.account.as_bytes());
        key
    }

    fn decode_record_key(key: &[u8]) -> Result<MembershipRecord, StoreError> {
        if key.len() != RECORD_KEY_LEN {
            return Err(StoreError::Corrupt(format!(
                "record key has {} bytes, expected {}",
                key.len(),
                RECORD_KEY_LEN
            )));
        }
        let table =
            Address::from_slice(&key[..32]).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let account =
            Address::from_slice(&key[32..]).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(MembershipRecord::new(table, account))
    }
}

fn missing_cf(name: &str) -> StoreError {
    StoreError::Io(format!("column family {} not found", name))
}

impl RecordStore for RocksDbStore {
    fn load_all(&self) -> Result<Vec<MembershipRecord>, StoreError> {
        let db = self.db.read();
        let cf = db.cf_handle(CF_RECORDS).ok_or_else(|| missing_cf(CF_RECORDS))?;

        let mut records = Vec::new();
        for item in db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) =
                item.map_err(|e| StoreError::Io(format!("RocksDB scan failed: {}", e)))?;
            records.push(Self::decode_record_key(&key)?);
        }
        Ok(records)
    }

    fn upsert(&self, record: &MembershipRecord) -> Result<(), StoreError> {
        let db = self.db.write();
        let cf = db.cf_handle(CF_RECORDS).ok_or_else(|| missing_cf(CF_RECORDS))?;

        db.put_cf_opt(cf, Self::record_key(record), b"", &self.write_opts())
            .map_err(|e| StoreError::Io(format!("RocksDB put failed: {}", e)))
    }

    fn delete_all_for_table(&self, table: &Address) -> Result<usize, StoreError> {
        let db = self.db.write();
        let cf = db.cf_handle(CF_RECORDS).ok_or_else(|| missing_cf(CF_RECORDS))?;
        let prefix: &[u8] = table.as_bytes();

        let mut batch = WriteBatch::default();
        let mut removed = 0;
        let iter = db.iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, _) =
                item.map_err(|e| StoreError::Io(format!("RocksDB scan failed: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            batch.delete_cf(cf, &key);
            removed += 1;
        }

        if removed > 0 {
            db.write_opt(batch, &self.write_opts())
                .map_err(|e| StoreError::Io(format!("RocksDB batch write failed: {}", e)))?;
        }
        Ok(removed)
    }
}

impl CheckpointStore for RocksDbStore {
    fn exists(&self, key: CheckpointKey) -> Result<bool, StoreError> {
        let db = self.db.read();
        let cf = db
            .cf_handle(CF_CHECKPOINTS)
            .ok_or_else(|| missing_cf(CF_CHECKPOINTS))?;
        db.get_pinned_cf(cf, key.name())
            .map(|v| v.is_some())
            .map_err(|e| StoreError::Io(format!("RocksDB exists check failed: {}", e)))
    }

    fn get(&self, key: CheckpointKey) -> Result<Option<Signature>, StoreError> {
        let db = self.db.read();
        let cf = db
            .cf_handle(CF_CHECKPOINTS)
            .ok_or_else(|| missing_cf(CF_CHECKPOINTS))?;
        let value = db
            .get_cf(cf, key.name())
            .map_err(|e| StoreError::Io(format!("RocksDB get failed: {}", e)))?;

        match value {
            None => Ok(None),
            Some(bytes) if bytes.is_empty() => Ok(None),
            Some(bytes) => String::from_utf8(bytes)
                .map(|s| Some(Signature::from(s)))
                .map_err(|e| StoreError::Corrupt(format!("checkpoint {}: {}", key, e))),
        }
    }

    fn set(&self, key: CheckpointKey, cursor: Option<&Signature>) -> Result<(), StoreError> {
        let db = self.db.write();
        let cf = db
            .cf_handle(CF_CHECKPOINTS)
            .ok_or_else(|| missing_cf(CF_CHECKPOINTS))?;
        let value = cursor.map(|s| s.as_str().as_bytes()).unwrap_or_default();

        db.put_cf_opt(cf, key.name(), value, &self.write_opts())
            .map_err(|e| StoreError::Io(format!("RocksDB put failed: {}", e)))
    }
}

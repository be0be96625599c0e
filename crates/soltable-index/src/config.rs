//! # Index Configuration
//!
//! Configuration for the lookup table index service and its JSON-RPC client.

use serde::{Deserialize, Serialize};

use crate::domain::{Address, Consistency, LOOKUP_TABLE_PROGRAM_ID};

/// Default bound on accounts in one table-selection query.
pub const DEFAULT_MAX_QUERY_ACCOUNTS: usize = 256;

/// Lookup table index configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Program whose instructions mutate lookup tables.
    pub lookup_table_program: Address,

    /// Maximum accounts accepted by a table-selection query, duplicates included.
    pub max_query_accounts: usize,

    /// Consistency level used when ingesting a single signature.
    pub ingest_consistency: Consistency,

    /// Consistency level used when fetching history during backfill.
    pub backfill_consistency: Consistency,

    /// Maximum events requested per history page.
    pub backfill_page_limit: usize,

    /// Pause between history pages, in milliseconds.
    pub backfill_page_delay_ms: u64,

    /// Transactions fetched concurrently while processing one page.
    pub backfill_fetch_concurrency: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            lookup_table_program: LOOKUP_TABLE_PROGRAM_ID,
            max_query_accounts: DEFAULT_MAX_QUERY_ACCOUNTS,
            ingest_consistency: Consistency::Confirmed,
            backfill_consistency: Consistency::Finalized,
            backfill_page_limit: 1000,
            backfill_page_delay_ms: 1000,
            backfill_fetch_concurrency: 8,
        }
    }
}

impl IndexConfig {
    /// Create a config for testing (small pages, no delay).
    pub fn for_testing() -> Self {
        Self {
            backfill_page_limit: 2,
            backfill_page_delay_ms: 0,
            backfill_fetch_concurrency: 2,
            ..Self::default()
        }
    }
}

/// Solana JSON-RPC client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Endpoint URL.
    pub url: String,

    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Commitment for table account reads.
    pub commitment: Consistency,

    /// Commitment for program history pages. Should not be weaker than
    /// [`IndexConfig::backfill_consistency`], or fresh events may not be
    /// fetchable yet.
    pub history_commitment: Consistency,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 5,
            commitment: Consistency::Confirmed,
            history_commitment: Consistency::Finalized,
        }
    }
}

impl RpcConfig {
    /// Config pointing at `url` with default timeouts.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

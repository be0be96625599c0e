//! # Node Configuration
//!
//! Command-line flags with environment fallbacks, resolved over defaults
//! into a [`NodeConfig`].
//!
//! | Flag | Environment | Default |
//! |------|-------------|---------|
//! | `--rpc-url` | `SOLANA_RPC` | mainnet-beta |
//! | `--listen` | `SOLTABLE_LISTEN` | `0.0.0.0:3000` |
//! | `--data-dir` | `SOLTABLE_DATA_DIR` | `./data/soltable` |
//! | `--no-backfill` | `SOLTABLE_NO_BACKFILL` | off |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use soltable_index::{IndexConfig, RpcConfig};
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "soltable-node")]
#[command(version, about = "Solana address lookup table index", long_about = None)]
pub struct Cli {
    /// Solana JSON-RPC endpoint
    #[arg(long, env = "SOLANA_RPC")]
    pub rpc_url: Option<String>,

    /// HTTP listen address
    #[arg(long, env = "SOLTABLE_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Directory holding the RocksDB database
    #[arg(long, env = "SOLTABLE_DATA_DIR", default_value = "./data/soltable")]
    pub data_dir: PathBuf,

    /// Skip the history backfill at startup
    #[arg(long, env = "SOLTABLE_NO_BACKFILL")]
    pub no_backfill: bool,

    /// Attempts per webhook signature before answering 503
    #[arg(long, env = "SOLTABLE_INGEST_ATTEMPTS", default_value_t = 5)]
    pub ingest_attempts: u32,

    /// First ingest retry delay, in milliseconds
    #[arg(long, env = "SOLTABLE_RETRY_BASE_MS", default_value_t = 500)]
    pub retry_base_ms: u64,

    /// Ingest retry delay cap, in milliseconds
    #[arg(long, env = "SOLTABLE_RETRY_MAX_MS", default_value_t = 8_000)]
    pub retry_max_ms: u64,

    /// Pause before restarting a backfill that hit a retryable error
    #[arg(long, env = "SOLTABLE_BACKFILL_RETRY_SECS", default_value_t = 30)]
    pub backfill_retry_secs: u64,

    /// History events requested per page
    #[arg(long, env = "SOLTABLE_PAGE_LIMIT", default_value_t = 1000)]
    pub page_limit: usize,

    /// Pause between history pages, in milliseconds
    #[arg(long, env = "SOLTABLE_PAGE_DELAY_MS", default_value_t = 1000)]
    pub page_delay_ms: u64,

    /// Concurrent transaction fetches per history page
    #[arg(long, env = "SOLTABLE_FETCH_CONCURRENCY", default_value_t = 8)]
    pub fetch_concurrency: usize,

    /// Largest accepted table-selection query
    #[arg(long, env = "SOLTABLE_MAX_QUERY_ACCOUNTS", default_value_t = 256)]
    pub max_query_accounts: usize,
}

impl Cli {
    /// Resolve flags over [`NodeConfig::default`].
    pub fn into_config(self) -> NodeConfig {
        let defaults = NodeConfig::default();

        let rpc = match self.rpc_url {
            Some(url) => RpcConfig {
                url,
                ..defaults.rpc
            },
            None => defaults.rpc,
        };

        NodeConfig {
            listen_addr: self.listen,
            data_dir: self.data_dir,
            rpc,
            index: IndexConfig {
                max_query_accounts: self.max_query_accounts,
                backfill_page_limit: self.page_limit,
                backfill_page_delay_ms: self.page_delay_ms,
                backfill_fetch_concurrency: self.fetch_concurrency,
                ..defaults.index
            },
            backfill_on_start: !self.no_backfill,
            backfill_retry_secs: self.backfill_retry_secs,
            ingest_retry: RetryPolicy {
                max_attempts: self.ingest_attempts,
                base_delay: Duration::from_millis(self.retry_base_ms),
                max_delay: Duration::from_millis(self.retry_max_ms),
            },
        }
    }
}

/// Resolved node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// HTTP listen address.
    pub listen_addr: SocketAddr,
    /// RocksDB directory.
    pub data_dir: PathBuf,
    /// JSON-RPC client settings.
    pub rpc: RpcConfig,
    /// Index service settings.
    pub index: IndexConfig,
    /// Run a backfill when the node starts.
    pub backfill_on_start: bool,
    /// Delay before a failed backfill is restarted.
    pub backfill_retry_secs: u64,
    /// Retry policy for webhook ingestion.
    pub ingest_retry: RetryPolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data_dir: PathBuf::from("./data/soltable"),
            rpc: RpcConfig::default(),
            index: IndexConfig::default(),
            backfill_on_start: true,
            backfill_retry_secs: 30,
            ingest_retry: RetryPolicy::default(),
        }
    }
}

/// Configuration rejected at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No RPC endpoint.
    #[error("RPC URL must not be empty")]
    EmptyRpcUrl,

    /// A count or limit that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    /// Retry cap below the first delay.
    #[error("retry max delay ({max_ms}ms) is below the base delay ({base_ms}ms)")]
    RetryBounds {
        /// Base delay in milliseconds
        base_ms: u128,
        /// Cap in milliseconds
        max_ms: u128,
    },
}

impl NodeConfig {
    /// Check the configuration before anything is opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.url.trim().is_empty() {
            return Err(ConfigError::EmptyRpcUrl);
        }

        let limits = [
            ("max query accounts", self.index.max_query_accounts),
            ("backfill page limit", self.index.backfill_page_limit),
            ("backfill fetch concurrency", self.index.backfill_fetch_concurrency),
            ("ingest attempts", self.ingest_retry.max_attempts as usize),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(ConfigError::ZeroLimit(name));
            }
        }

        if self.ingest_retry.max_delay < self.ingest_retry.base_delay {
            return Err(ConfigError::RetryBounds {
                base_ms: self.ingest_retry.base_delay.as_millis(),
                max_ms: self.ingest_retry.max_delay.as_millis(),
            });
        }
        Ok(())
    }
}

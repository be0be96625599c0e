//! # Soltable Node
//!
//! Runs the lookup table index as a service: durable stores, the Solana
//! JSON-RPC client, the startup backfill and the HTTP surface.
//!
//! ## Module Structure
//!
//! ```text
//! soltable-node/
//! ├── adapters/storage/  # RocksDB record + checkpoint store
//! ├── config.rs          # CLI flags, env fallbacks, validation
//! ├── http/              # axum router and handlers
//! ├── metrics.rs         # Report -> Prometheus updates
//! ├── retry.rs           # Exponential backoff for retryable errors
//! └── runtime.rs         # NodeRuntime: startup, backfill task, shutdown
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod http;
pub mod metrics;
pub mod retry;
pub mod runtime;

pub use config::{Cli, ConfigError, NodeConfig};
pub use http::{router, AppState};
pub use retry::{with_retry, RetryPolicy};
pub use runtime::{run_backfill_loop, NodeRuntime};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

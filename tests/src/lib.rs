//! # Soltable Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── flows.rs      # Webhook, backfill and selection through the service and router
//! │   └── restart.rs    # RocksDB persistence across node restarts
//! └── benches/
//!     └── resolver_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p soltable-tests
//! cargo bench -p soltable-tests
//! ```

pub mod integration;

//! # Algorithms Module
//!
//! Pure algorithms over the domain: greedy table selection and per-batch
//! table discovery.

pub mod discovery;
pub mod resolver;

pub use discovery::tables_in_batch;
pub use resolver::{dedup_accounts, rank_candidates, select_tables, MIN_CANDIDATE_TALLY};

//! # Application Module
//!
//! Application services orchestrating the domain and outbound ports.

pub mod backfill;
pub mod ingest;
pub mod reconcile;
pub mod service;

pub use backfill::Backfiller;
pub use ingest::Ingestor;
pub use reconcile::{Reconciler, TableGate};
pub use service::{seed_checkpoints, LookupTableService};

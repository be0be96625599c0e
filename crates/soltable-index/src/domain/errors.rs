//! # Domain Errors
//!
//! Error types for the lookup table index.
//!
//! A transaction that failed on-chain is not represented here: ingesting it
//! is a successful no-op (see [`IngestStatus`](super::IngestStatus)).

use thiserror::Error;

use super::value_objects::Signature;

/// Lookup table index error types.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The ledger has not finalized the transaction at the requested
    /// consistency level yet. The caller retries later.
    #[error("Transaction not ready: {signature}")]
    NotReady {
        /// Signature that could not be resolved yet
        signature: Signature,
    },

    /// Network or API failure talking to the ledger or history feed.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Caller supplied input outside the accepted bounds.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Too many accounts in a table-selection query.
    #[error("Too many accounts: {got} > {max}")]
    TooManyAccounts {
        /// Accounts supplied, duplicates included
        got: usize,
        /// Maximum accepted
        max: usize,
    },

    /// Durable store failure (record store or checkpoint store).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Upstream payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl IndexError {
    /// Whether the caller should schedule a retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexError::NotReady { .. } | IndexError::UpstreamUnavailable(_)
        )
    }

    /// Whether the error was caused by the caller's input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            IndexError::InvalidInput(_) | IndexError::TooManyAccounts { .. }
        )
    }
}

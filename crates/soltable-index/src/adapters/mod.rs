//! # Adapters
//!
//! Concrete implementations of the outbound ports for a Solana RPC node.

pub mod rpc_types;
pub mod solana_rpc;

pub use solana_rpc::SolanaRpcClient;

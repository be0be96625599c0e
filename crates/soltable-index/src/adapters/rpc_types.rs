//! Solana JSON-RPC wire types.
//!
//! Only the fields the index reads are modelled; everything else in the
//! responses is ignored.

use serde::{Deserialize, Serialize};

use crate::domain::{
    Address, HistoryEvent, IndexError, ParsedTransaction, Signature, TransactionInstruction,
};

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<P> {
    /// Always "2.0".
    pub jsonrpc: &'static str,
    /// Request id.
    pub id: u64,
    /// Method name.
    pub method: String,
    /// Positional params.
    pub params: P,
}

impl<P> JsonRpcRequest<P> {
    /// Build a request.
    pub fn new(method: impl Into<String>, params: P, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response envelope. `result` is absent or null on error
/// and for "not found" answers.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<R> {
    /// Result payload.
    pub result: Option<R>,
    /// Error object.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Message.
    pub message: String,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// `{ context, value }` wrapper used by account queries.
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    /// Slot the answer was read at.
    pub context: RpcContext,
    /// Payload.
    pub value: T,
}

/// Response context.
#[derive(Debug, Deserialize)]
pub struct RpcContext {
    /// Slot.
    pub slot: u64,
}

/// `getAccountInfo` account with base64 data.
#[derive(Debug, Deserialize)]
pub struct UiAccount {
    /// `[data, "base64"]`.
    pub data: (String, String),
    /// Owning program, base58.
    pub owner: String,
    /// Balance.
    pub lamports: u64,
}

/// One `getSignaturesForAddress` entry.
#[derive(Debug, Deserialize)]
pub struct SignatureInfo {
    /// Transaction signature.
    pub signature: String,
    /// Slot.
    pub slot: u64,
    /// On-chain error, null on success.
    #[serde(default)]
    pub err: Option<serde_json::Value>,
}

impl From<SignatureInfo> for HistoryEvent {
    fn from(info: SignatureInfo) -> Self {
        HistoryEvent {
            signature: Signature::new(info.signature),
            slot: info.slot,
            failed: info.err.is_some(),
        }
    }
}

/// `getTransaction` result with `"encoding": "json"`.
#[derive(Debug, Deserialize)]
pub struct EncodedTransactionWithMeta {
    /// Slot.
    pub slot: u64,
    /// Status metadata; may be null for very old transactions.
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
    /// Transaction body.
    pub transaction: EncodedTransaction,
}

/// Transaction status metadata.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    /// On-chain error, null on success.
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    /// Addresses loaded from lookup tables (v0 transactions).
    #[serde(default)]
    pub loaded_addresses: Option<LoadedAddresses>,
}

/// Addresses loaded through lookup tables, writable first.
#[derive(Debug, Default, Deserialize)]
pub struct LoadedAddresses {
    /// Writable loaded addresses.
    #[serde(default)]
    pub writable: Vec<String>,
    /// Read-only loaded addresses.
    #[serde(default)]
    pub readonly: Vec<String>,
}

/// Transaction body.
#[derive(Debug, Deserialize)]
pub struct EncodedTransaction {
    /// Signatures, first one is the transaction id.
    #[serde(default)]
    pub signatures: Vec<String>,
    /// Message.
    pub message: UiRawMessage,
}

/// Message with account keys and compiled instructions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiRawMessage {
    /// Static account keys.
    pub account_keys: Vec<String>,
    /// Top-level instructions.
    pub instructions: Vec<UiCompiledInstruction>,
}

/// Compiled instruction referencing accounts by index.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiCompiledInstruction {
    /// Index of the program in the account list.
    pub program_id_index: u16,
    /// Account indices.
    pub accounts: Vec<u16>,
    /// Instruction data, base58.
    pub data: String,
}

impl EncodedTransactionWithMeta {
    /// Resolve account indices and decode instruction data.
    ///
    /// Indices address the static keys, then loaded writable, then loaded
    /// read-only addresses.
    pub fn into_parsed(self, signature: Signature) -> Result<ParsedTransaction, IndexError> {
        let loaded = self
            .meta
            .as_ref()
            .and_then(|meta| meta.loaded_addresses.as_ref());

        let keys: Vec<Address> = self
            .transaction
            .message
            .account_keys
            .iter()
            .chain(loaded.into_iter().flat_map(|l| l.writable.iter()))
            .chain(loaded.into_iter().flat_map(|l| l.readonly.iter()))
            .map(|key| key.parse::<Address>().map_err(|e| IndexError::Decode(e.to_string())))
            .collect::<Result<_, _>>()?;

        let lookup = |idx: u16| -> Result<Address, IndexError> {
            keys.get(idx as usize).copied().ok_or_else(|| {
                IndexError::Decode(format!(
                    "account index {} out of range ({} keys) in {}",
                    idx,
                    keys.len(),
                    signature
                ))
            })
        };

        let instructions = self
            .transaction
            .message
            .instructions
            .iter()
            .map(|ix| -> Result<TransactionInstruction, IndexError> {
                Ok(TransactionInstruction {
                    program_id: lookup(ix.program_id_index)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|idx| lookup(*idx))
                        .collect::<Result<_, IndexError>>()?,
                    data: bs58::decode(&ix.data)
                        .into_vec()
                        .map_err(|e| IndexError::Decode(format!("instruction data: {e}")))?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let failed = self.meta.as_ref().is_some_and(|meta| meta.err.is_some());

        Ok(ParsedTransaction {
            signature,
            slot: self.slot,
            failed,
            instructions,
        })
    }
}

//! # Solana JSON-RPC Adapter
//!
//! Implements [`LedgerClient`] and [`HistoryClient`] over a Solana RPC
//! endpoint.
//!
//! | Port call | RPC method |
//! |-----------|------------|
//! | `get_transaction` | `getTransaction` (json encoding, v0 supported) |
//! | `get_table_state` | `getAccountInfo` (base64) + account codec |
//! | `list_events` | `getSignaturesForAddress` |

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::rpc_types::{
    EncodedTransactionWithMeta, JsonRpcRequest, JsonRpcResponse, RpcResponse, SignatureInfo,
    UiAccount,
};
use crate::config::RpcConfig;
use crate::domain::{
    decode_table_state, Address, Consistency, HistoryEvent, IndexError, ParsedTransaction,
    Signature, TableState, LOOKUP_TABLE_PROGRAM_ID,
};
use crate::ports::{HistoryClient, LedgerClient};

/// Solana JSON-RPC client.
pub struct SolanaRpcClient {
    client: Client,
    url: String,
    request_id: AtomicU64,
    commitment: Consistency,
    history_commitment: Consistency,
}

impl SolanaRpcClient {
    /// Create a client from config.
    pub fn new(config: &RpcConfig) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| IndexError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            request_id: AtomicU64::new(1),
            commitment: config.commitment,
            history_commitment: config.history_commitment,
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call a JSON-RPC method. `Ok(None)` when the result is null.
    async fn call<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<R>, IndexError> {
        let request = JsonRpcRequest::new(method, params, self.next_id());
        debug!(method, id = request.id, "[soltable] RPC call");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                if e.is_connect() {
                    IndexError::UpstreamUnavailable(format!("Cannot connect to {}", self.url))
                } else {
                    IndexError::UpstreamUnavailable(format!("{method}: {e}"))
                }
            })?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| IndexError::Decode(format!("{method}: {e}")))?;

        if let Some(error) = rpc_response.error {
            return Err(IndexError::UpstreamUnavailable(format!("{method}: {error}")));
        }

        Ok(rpc_response.result)
    }
}

#[async_trait]
impl LedgerClient for SolanaRpcClient {
    async fn get_transaction(
        &self,
        signature: &Signature,
        consistency: Consistency,
    ) -> Result<Option<ParsedTransaction>, IndexError> {
        let params = json!([
            signature.as_str(),
            {
                "encoding": "json",
                "commitment": consistency.as_str(),
                "maxSupportedTransactionVersion": 0
            }
        ]);

        let Some(tx) = self
            .call::<EncodedTransactionWithMeta>("getTransaction", params)
            .await?
        else {
            debug!(signature = %signature, "[soltable] Transaction not available yet");
            return Ok(None);
        };

        tx.into_parsed(signature.clone()).map(Some)
    }

    async fn get_table_state(&self, table: &Address) -> Result<Option<TableState>, IndexError> {
        let params = json!([
            table.to_string(),
            { "encoding": "base64", "commitment": self.commitment.as_str() }
        ]);

        let response = self
            .call::<RpcResponse<Option<UiAccount>>>("getAccountInfo", params)
            .await?
            .ok_or_else(|| IndexError::Decode("getAccountInfo: null result".to_string()))?;

        let Some(account) = response.value else {
            return Ok(None);
        };

        if account.owner != LOOKUP_TABLE_PROGRAM_ID.to_string() {
            debug!(table = %table, owner = %account.owner, "[soltable] Not a lookup table account");
            return Ok(None);
        }

        let data = base64::engine::general_purpose::STANDARD
            .decode(&account.data.0)
            .map_err(|e| IndexError::Decode(format!("account data: {e}")))?;

        decode_table_state(*table, &data).inspect_err(|err| {
            warn!(table = %table, error = %err, "[soltable] Malformed lookup table account");
        })
    }
}

#[async_trait]
impl HistoryClient for SolanaRpcClient {
    async fn list_events(
        &self,
        program: &Address,
        before: Option<&Signature>,
        until: Option<&Signature>,
        limit: usize,
    ) -> Result<Vec<HistoryEvent>, IndexError> {
        let mut options = json!({
            "limit": limit,
            "commitment": self.history_commitment.as_str(),
        });
        if let Some(before) = before {
            options["before"] = json!(before.as_str());
        }
        if let Some(until) = until {
            options["until"] = json!(until.as_str());
        }

        let infos = self
            .call::<Vec<SignatureInfo>>("getSignaturesForAddress", json!([program.to_string(), options]))
            .await?
            .unwrap_or_default();

        Ok(infos.into_iter().map(HistoryEvent::from).collect())
    }
}

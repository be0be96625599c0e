//! Route handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use soltable_index::{Address, IndexError, IngestStatus, LookupTableIndexApi, Signature};
use soltable_telemetry::{encode_metrics, HistogramTimer, INGEST_DURATION};
use tracing::{info, warn};

use super::AppState;
use crate::metrics;
use crate::retry::with_retry;

/// One webhook entry. Fields other than `signature` are ignored.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// Transaction signature
    pub signature: String,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

/// `POST /index`
///
/// Ingests every delivered signature with the node's retry policy. Answers
/// 503 while any signature is still failing with a retryable error, so the
/// sender redelivers; re-ingesting the others is harmless.
pub async fn index_signatures(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let events: Vec<WebhookEvent> = match serde_json::from_slice(&body) {
        Ok(events) => events,
        Err(e) => {
            return error_body(StatusCode::BAD_REQUEST, format!("invalid webhook body: {}", e))
        }
    };
    if events.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "no signatures delivered");
    }

    let mut applied = 0usize;
    let mut skipped = 0usize;
    let mut failed = Vec::new();
    let mut only_retryable = true;

    for event in events {
        let signature = Signature::from(event.signature);
        let service = state.service.as_ref();
        let sig = &signature;

        let result = {
            let _timer = HistogramTimer::new(&INGEST_DURATION);
            with_retry(&state.ingest_retry, move || service.ingest_signature(sig)).await
        };

        match result {
            Ok(report) => {
                metrics::record_ingest(&report);
                match report.status {
                    IngestStatus::Applied => applied += 1,
                    IngestStatus::SkippedFailedTransaction => skipped += 1,
                }
            }
            Err(err) => {
                warn!(signature = %signature, error = %err, "[soltable] Ingest failed");
                metrics::record_ingest_error(&err);
                only_retryable &= err.is_retryable();
                failed.push(signature.into_string());
            }
        }
    }
    metrics::refresh_index_gauge(&state.service);

    if failed.is_empty() {
        info!(applied, skipped, "[soltable] Webhook batch ingested");
        return (
            StatusCode::OK,
            Json(json!({ "applied": applied, "skipped": skipped })),
        );
    }

    let status = if only_retryable {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(json!({
            "error": "some signatures could not be ingested",
            "applied": applied,
            "skipped": skipped,
            "failed": failed,
        })),
    )
}

/// `POST /findTables`
pub async fn find_tables(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let raw: Vec<String> = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, format!("invalid body: {}", e)),
    };
    if raw.len() > state.service.config().max_query_accounts {
        metrics::record_resolve(false);
        return error_body(StatusCode::NOT_ACCEPTABLE, "accounts too large");
    }

    let mut accounts = Vec::with_capacity(raw.len());
    for value in &raw {
        match value.parse::<Address>() {
            Ok(address) => accounts.push(address),
            Err(_) => {
                return error_body(StatusCode::BAD_REQUEST, format!("invalid account: {}", value))
            }
        }
    }

    match state.service.resolve(&accounts) {
        Ok(result) => {
            metrics::record_resolve(true);
            (
                StatusCode::OK,
                Json(json!({
                    "matchedTables": result.selected_tables,
                    "matchedAccounts": result.matched_accounts,
                })),
            )
        }
        Err(IndexError::TooManyAccounts { .. }) => {
            metrics::record_resolve(false);
            error_body(StatusCode::NOT_ACCEPTABLE, "accounts too large")
        }
        Err(err) if err.is_invalid_input() => {
            metrics::record_resolve(false);
            error_body(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err) => error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.service.stats();
    Json(json!({
        "accounts": stats.total_records,
        "tables": stats.distinct_tables,
        "duplicates": stats.duplicate_ratio,
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "records": state.service.record_count(),
        "backfillRunning": state.service.backfill_running(),
    }))
}

/// `GET /metrics`
pub async fn metrics_text(State(state): State<AppState>) -> Response {
    metrics::refresh_index_gauge(&state.service);
    match encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use soltable_index::domain::{OPCODE_DEACTIVATE, OPCODE_EXTEND};
    use soltable_index::{
        IndexConfig, InMemoryCheckpointStore, InMemoryRecordStore, LookupTableService,
        MembershipRecord, MockHistory, MockLedger, ParsedTransaction, TableState,
        TransactionInstruction, LOOKUP_TABLE_PROGRAM_ID,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::http::router;
    use crate::retry::RetryPolicy;

    fn addr(n: u8) -> Address {
        Address::new([n; 32])
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        }
    }

    fn setup(records: Vec<MembershipRecord>) -> (Arc<MockLedger>, axum::Router) {
        let ledger = Arc::new(MockLedger::new());
        let service = LookupTableService::new(
            IndexConfig::for_testing(),
            ledger.clone(),
            Arc::new(MockHistory::default()),
            Arc::new(InMemoryRecordStore::with_records(records)),
            Arc::new(InMemoryCheckpointStore::new()),
        )
        .unwrap();
        let app = router(AppState::new(Arc::new(service), fast_retry()));
        (ledger, app)
    }

    fn scenario() -> Vec<MembershipRecord> {
        [(101, 1), (101, 2), (102, 2), (102, 3)]
            .iter()
            .map(|(t, a)| MembershipRecord::new(addr(*t), addr(*a)))
            .collect()
    }

    fn lookup_tx(signature: &str, table: Address, opcode: u32) -> ParsedTransaction {
        ParsedTransaction {
            signature: Signature::new(signature),
            slot: 1,
            failed: false,
            instructions: vec![TransactionInstruction {
                program_id: LOOKUP_TABLE_PROGRAM_ID,
                accounts: vec![table],
                data: opcode.to_le_bytes().to_vec(),
            }],
        }
    }

    fn post(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_find_tables_scenario() {
        let (_, app) = setup(scenario());
        let body = json!([addr(1), addr(2), addr(3)]).to_string();

        let response = app.oneshot(post("/findTables", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(
            json["matchedTables"],
            json!([addr(101).to_string(), addr(102).to_string()])
        );
        assert_eq!(json["matchedAccounts"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_find_tables_too_many_accounts() {
        let (_, app) = setup(Vec::new());
        let accounts: Vec<String> = (0..257u32)
            .map(|n| {
                let mut bytes = [0u8; 32];
                bytes[..4].copy_from_slice(&n.to_le_bytes());
                Address::new(bytes).to_string()
            })
            .collect();

        let response = app
            .oneshot(post("/findTables", json!(accounts).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(json_body(response).await["error"], "accounts too large");
    }

    #[tokio::test]
    async fn test_find_tables_bound_counts_duplicates() {
        let (_, app) = setup(scenario());
        let accounts = vec![addr(1).to_string(); 300];

        let response = app
            .oneshot(post("/findTables", json!(accounts).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_find_tables_oversized_rejected_before_parsing() {
        let (_, app) = setup(Vec::new());
        let accounts = vec!["not-base58-0OIl".to_string(); 257];

        let response = app
            .oneshot(post("/findTables", json!(accounts).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_find_tables_rejects_bad_base58() {
        let (_, app) = setup(Vec::new());
        let response = app
            .oneshot(post("/findTables", r#"["not-base58-0OIl"]"#.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_index_applies_extend() {
        let (ledger, app) = setup(Vec::new());
        ledger.set_table(TableState::active(addr(101), vec![addr(1), addr(2)]));
        ledger.insert_transaction(lookup_tx("ext", addr(101), OPCODE_EXTEND));

        let body = json!([{ "signature": "ext", "type": "UNKNOWN" }]).to_string();
        let response = app.clone().oneshot(post("/index", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["applied"], 1);

        let response = app.oneshot(get("/stats")).await.unwrap();
        let json = json_body(response).await;
        assert_eq!(json["accounts"], 2);
        assert_eq!(json["tables"], 1);
    }

    #[tokio::test]
    async fn test_index_deactivation() {
        let (ledger, app) = setup(scenario());
        ledger.set_table(TableState::inactive(addr(101)));
        ledger.insert_transaction(lookup_tx("deact", addr(101), OPCODE_DEACTIVATE));

        let body = json!([{ "signature": "deact" }]).to_string();
        let response = app.clone().oneshot(post("/index", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(app.oneshot(get("/stats")).await.unwrap()).await;
        assert_eq!(json["accounts"], 2);
        assert_eq!(json["tables"], 1);
    }

    #[tokio::test]
    async fn test_index_not_ready_is_unavailable() {
        let (_, app) = setup(Vec::new());
        let body = json!([{ "signature": "unknown" }]).to_string();

        let response = app.oneshot(post("/index", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["failed"], json!(["unknown"]));
    }

    #[tokio::test]
    async fn test_index_rejects_bad_bodies() {
        let (_, app) = setup(Vec::new());

        let response = app
            .clone()
            .oneshot(post("/index", "{not json".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(post("/index", "[]".to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_and_health() {
        let (_, app) = setup(scenario());

        let json = json_body(app.clone().oneshot(get("/stats")).await.unwrap()).await;
        assert_eq!(json["accounts"], 4);
        assert_eq!(json["tables"], 2);
        assert_eq!(json["duplicates"], 0.25);

        let json = json_body(app.oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["records"], 4);
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        soltable_telemetry::register_metrics().unwrap();
        let (_, app) = setup(scenario());

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("soltable_index_records"));
    }
}

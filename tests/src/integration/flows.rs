//! # Integration Flows
//!
//! Backfill, webhook ingestion and table selection exercised together
//! through the service and the HTTP router.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use soltable_index::{
        CheckpointKey, CheckpointStore, HistoryEvent, InMemoryCheckpointStore,
        InMemoryRecordStore, LookupTableIndexApi, MembershipRecord, RecordStore, Signature,
        TableState,
    };
    use soltable_node::{router, AppState, RetryPolicy};
    use tower::ServiceExt;

    use crate::integration::fixtures::*;

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // =========================================================================
    // Backfill -> webhook -> selection
    // =========================================================================

    #[tokio::test]
    async fn test_backfill_webhook_and_find_tables() {
        let (ledger, history) = chain(4);
        let service = Arc::new(service(
            ledger.clone(),
            history,
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryCheckpointStore::new()),
        ));

        let report = service.run_backfill().await.unwrap();
        assert_eq!(report.events, 4);
        assert_eq!(service.record_count(), 8);

        // A table created after the backfill arrives by webhook
        add_event(&ledger, 5);
        let app = router(AppState::new(service.clone(), RetryPolicy::no_retry()));
        let response = app
            .clone()
            .oneshot(post("/index", json!([{ "signature": "e5" }])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let accounts: Vec<String> = (1..=6).map(|n| addr(n).to_string()).collect();
        let response = app
            .oneshot(post("/findTables", json!(accounts)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        let tables: Vec<String> = (1..=5).map(|n| table_of(n).to_string()).collect();
        assert_eq!(json["matchedTables"], json!(tables));
        assert_eq!(json["matchedAccounts"], json!(accounts));
    }

    #[tokio::test]
    async fn test_deactivation_webhook_removes_table_from_selection() {
        let (ledger, history) = chain(2);
        let service = Arc::new(service(
            ledger.clone(),
            history,
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryCheckpointStore::new()),
        ));
        service.run_backfill().await.unwrap();

        let query = [addr(1), addr(2)];
        assert_eq!(
            service.resolve(&query).unwrap().selected_tables,
            vec![table_of(1)]
        );

        ledger.set_table(TableState::inactive(table_of(1)));
        ledger.insert_transaction(deactivate_tx("close", table_of(1)));
        let app = router(AppState::new(service.clone(), RetryPolicy::no_retry()));
        let response = app
            .oneshot(post("/index", json!([{ "signature": "close" }])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(service.resolve(&query).unwrap().selected_tables.is_empty());
        assert_eq!(service.stats().distinct_tables, 1);
    }

    // =========================================================================
    // Backfill resumption
    // =========================================================================

    #[tokio::test]
    async fn test_interrupted_backfill_converges_to_clean_run() {
        // Clean run
        let (ledger, history) = chain(6);
        let clean_store = Arc::new(InMemoryRecordStore::new());
        let clean = service(
            ledger,
            history,
            clean_store.clone(),
            Arc::new(InMemoryCheckpointStore::new()),
        );
        clean.run_backfill().await.unwrap();

        // Interrupted after the first page, then resumed
        let (ledger, history) = chain(6);
        let store = Arc::new(InMemoryRecordStore::new());
        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        let resumed = service(ledger, history.clone(), store.clone(), checkpoints.clone());

        history.fail_from_call(Some(1));
        let err = resumed.run_backfill().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            checkpoints.get(CheckpointKey::FirstSeenCursor).unwrap(),
            Some(Signature::new("e5"))
        );

        history.fail_from_call(None);
        resumed.run_backfill().await.unwrap();
        assert_eq!(checkpoints.get(CheckpointKey::FirstSeenCursor).unwrap(), None);

        let mut expected = clean_store.load_all().unwrap();
        let mut actual = store.load_all().unwrap();
        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);
        assert_eq!(resumed.stats(), clean.stats());
    }

    #[tokio::test]
    async fn test_incremental_backfill_only_scans_new_events() {
        let (ledger, history) = chain(3);
        let service = service(
            ledger.clone(),
            history.clone(),
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryCheckpointStore::new()),
        );
        service.run_backfill().await.unwrap();
        let fetches = ledger.table_fetches();

        let newer: Vec<HistoryEvent> = vec![add_event(&ledger, 5), add_event(&ledger, 4)];
        history.push_newer(newer);

        let report = service.run_backfill().await.unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(ledger.table_fetches() - fetches, 2);
        assert_eq!(service.record_count(), 10);
    }

    // =========================================================================
    // Concurrency
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ingest_and_queries() {
        let (ledger, _) = chain(0);
        for n in 1..=20u8 {
            add_event(&ledger, n);
        }
        let store = Arc::new(InMemoryRecordStore::new());
        let service = Arc::new(service(
            ledger,
            Arc::new(soltable_index::MockHistory::default()),
            store.clone(),
            Arc::new(InMemoryCheckpointStore::new()),
        ));

        let mut handles = Vec::new();
        for n in 1..=20u8 {
            // every signature delivered twice, concurrently
            for _ in 0..2 {
                let service = service.clone();
                handles.push(tokio::spawn(async move {
                    service
                        .ingest_signature(&Signature::new(format!("e{}", n)))
                        .await
                        .map(|_| ())
                }));
            }
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.resolve(&[addr(n), addr(n + 1)]).map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = service.index().read().records();
        let unique: HashSet<MembershipRecord> = records.iter().copied().collect();
        assert_eq!(records.len(), 40);
        assert_eq!(unique.len(), 40);
        assert_eq!(store.len(), 40);

        for n in 1..=20u8 {
            let result = service.resolve(&[addr(n), addr(n + 1)]).unwrap();
            assert_eq!(result.selected_tables.len(), 1);
        }
    }
}

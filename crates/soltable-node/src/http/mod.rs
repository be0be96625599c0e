//! # HTTP Surface
//!
//! Thin transport around [`LookupTableService`]:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /index` | Webhook delivery: `[{ "signature": ... }, ...]` |
//! | `POST /findTables` | Tables covering a list of base58 accounts |
//! | `GET /stats` | Record, table and duplicate counts |
//! | `GET /health` | Liveness |
//! | `GET /metrics` | Prometheus text exposition |
//!
//! CORS is open to any origin.

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use soltable_index::LookupTableService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::retry::RetryPolicy;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Index service.
    pub service: Arc<LookupTableService>,
    /// Retry policy applied to each webhook signature.
    pub ingest_retry: RetryPolicy,
}

impl AppState {
    /// Create handler state.
    pub fn new(service: Arc<LookupTableService>, ingest_retry: RetryPolicy) -> Self {
        Self {
            service,
            ingest_retry,
        }
    }
}

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/index", post(handlers::index_signatures))
        .route("/findTables", post(handlers::find_tables))
        .route("/stats", get(handlers::stats))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_text))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

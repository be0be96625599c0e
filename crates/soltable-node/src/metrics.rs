//! Translates index reports into Prometheus metric updates.

use soltable_index::{
    BackfillReport, IndexError, IngestReport, IngestStatus, LookupTableService, ReconcileOutcome,
};
use soltable_telemetry::{
    metric_inc, BACKFILL_PAGES, INDEX_RECORDS, RECONCILIATIONS, RECORDS_INSERTED, RECORDS_REMOVED,
    RESOLVE_QUERIES, SIGNATURES_INGESTED,
};

/// Record one successfully ingested signature.
pub fn record_ingest(report: &IngestReport) {
    let outcome = match report.status {
        IngestStatus::Applied => "applied",
        IngestStatus::SkippedFailedTransaction => "skipped",
    };
    metric_inc!(SIGNATURES_INGESTED, &[outcome]);

    for reconciled in &report.outcomes {
        record_reconcile(reconciled);
    }
}

/// Record a signature whose ingestion failed for good.
pub fn record_ingest_error(err: &IndexError) {
    let outcome = match err {
        IndexError::NotReady { .. } => "not_ready",
        _ => "error",
    };
    metric_inc!(SIGNATURES_INGESTED, &[outcome]);
}

/// Record one table reconciliation.
pub fn record_reconcile(outcome: &ReconcileOutcome) {
    metric_inc!(RECONCILIATIONS, &[outcome.label()]);
    match outcome {
        ReconcileOutcome::Extended { added, .. } => RECORDS_INSERTED.inc_by(*added as f64),
        ReconcileOutcome::Removed { removed, .. } => RECORDS_REMOVED.inc_by(*removed as f64),
        ReconcileOutcome::Superseded { .. } => {}
    }
}

/// Record a completed backfill run.
pub fn record_backfill(report: &BackfillReport) {
    BACKFILL_PAGES.inc_by(report.pages as f64);
}

/// Record a table-selection query.
pub fn record_resolve(accepted: bool) {
    let result = if accepted { "ok" } else { "rejected" };
    metric_inc!(RESOLVE_QUERIES, &[result]);
}

/// Set the index size gauge from the live index.
pub fn refresh_index_gauge(service: &LookupTableService) {
    INDEX_RECORDS.set(service.record_count() as f64);
}

//! Prometheus metrics for the lookup table index.
//!
//! All metrics follow the naming convention: `soltable_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Signatures ingested, by outcome (applied/skipped/not_ready/error)
    pub static ref SIGNATURES_INGESTED: CounterVec = CounterVec::new(
        Opts::new("soltable_ingest_signatures_total", "Signatures ingested by outcome"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Table reconciliations, by outcome (extended/removed/superseded)
    pub static ref RECONCILIATIONS: CounterVec = CounterVec::new(
        Opts::new("soltable_reconcile_tables_total", "Table reconciliations by outcome"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Membership records inserted
    pub static ref RECORDS_INSERTED: Counter = Counter::new(
        "soltable_index_records_inserted_total",
        "Membership records inserted"
    ).expect("metric creation failed");

    /// Membership records removed by deactivation
    pub static ref RECORDS_REMOVED: Counter = Counter::new(
        "soltable_index_records_removed_total",
        "Membership records removed"
    ).expect("metric creation failed");

    /// Records currently in the index
    pub static ref INDEX_RECORDS: Gauge = Gauge::new(
        "soltable_index_records",
        "Membership records in the in-memory index"
    ).expect("metric creation failed");

    /// History pages processed by backfill
    pub static ref BACKFILL_PAGES: Counter = Counter::new(
        "soltable_backfill_pages_total",
        "History pages processed by backfill"
    ).expect("metric creation failed");

    /// Table-selection queries, by result (ok/rejected)
    pub static ref RESOLVE_QUERIES: CounterVec = CounterVec::new(
        Opts::new("soltable_resolve_queries_total", "Table-selection queries by result"),
        &["result"]
    ).expect("metric creation failed");

    /// Ingestion latency including retries
    pub static ref INGEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "soltable_ingest_duration_seconds",
            "Time spent ingesting one signature, retries included"
        ).buckets(exponential_buckets(0.01, 2.0, 12).expect("bucket creation failed"))
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SIGNATURES_INGESTED.clone()),
        Box::new(RECONCILIATIONS.clone()),
        Box::new(RECORDS_INSERTED.clone()),
        Box::new(RECORDS_REMOVED.clone()),
        Box::new(INDEX_RECORDS.clone()),
        Box::new(BACKFILL_PAGES.clone()),
        Box::new(RESOLVE_QUERIES.clone()),
        Box::new(INGEST_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

//! Prometheus metrics backend for the key/value application.
//!
//! Implements [`kvstore_metrics::MetricsRecorder`] using native Prometheus
//! counters, gauges, and histograms.
//!
//! # Usage
//!
//! Call [`install()`] once at startup before any metrics are recorded:
//! ```ignore
//! kvstore_metrics_prometheus::install();
//! ```

use kvstore_metrics::MetricsRecorder;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
    Counter, CounterVec, Gauge, GaugeVec, Histogram,
};

/// Domain-specific Prometheus metrics.
pub struct Metrics {
    // === Blocks ===
    pub blocks_committed: Counter,
    pub block_commit_latency: Histogram,
    pub block_height: Gauge,
    pub build_info: GaugeVec,

    // === Transactions ===
    pub txs_checked: CounterVec,
    pub txs_delivered: CounterVec,

    // === Queries ===
    pub queries: CounterVec,

    // === Storage ===
    pub storage_read_latency: Histogram,
    pub storage_write_latency: Histogram,
    pub storage_batch_size: Histogram,

    // === Errors ===
    pub fatal_faults: CounterVec,
}

impl Metrics {
    fn new() -> Self {
        let latency_buckets = vec![
            0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ];

        let build_info = register_gauge_vec!(
            "kvstore_build_info",
            "Node build information",
            &["version"]
        )
        .unwrap();

        build_info
            .with_label_values(&[env!("CARGO_PKG_VERSION")])
            .set(1.0);

        Self {
            build_info,

            // Blocks
            blocks_committed: register_counter!(
                "kvstore_blocks_committed_total",
                "Total number of blocks committed"
            )
            .unwrap(),

            block_commit_latency: register_histogram!(
                "kvstore_block_commit_latency_seconds",
                "Time from begin-block to durable commit",
                latency_buckets.clone()
            )
            .unwrap(),

            block_height: register_gauge!("kvstore_block_height", "Last committed block height")
                .unwrap(),

            // Transactions
            txs_checked: register_counter_vec!(
                "kvstore_txs_checked_total",
                "Admission checks by outcome",
                &["result"]
            )
            .unwrap(),

            txs_delivered: register_counter_vec!(
                "kvstore_txs_delivered_total",
                "Block-time transactions by outcome",
                &["result"]
            )
            .unwrap(),

            // Queries
            queries: register_counter_vec!(
                "kvstore_queries_total",
                "Point reads by outcome",
                &["result"]
            )
            .unwrap(),

            // Storage
            storage_read_latency: register_histogram!(
                "kvstore_storage_read_latency_seconds",
                "Storage point read latency",
                latency_buckets.clone()
            )
            .unwrap(),

            storage_write_latency: register_histogram!(
                "kvstore_storage_write_latency_seconds",
                "Storage atomic commit latency",
                latency_buckets
            )
            .unwrap(),

            storage_batch_size: register_histogram!(
                "kvstore_storage_batch_size",
                "Number of writes per atomic commit",
                vec![0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
            )
            .unwrap(),

            // Errors
            fatal_faults: register_counter_vec!(
                "kvstore_fatal_faults_total",
                "Unrecoverable faults by kind",
                &["kind"]
            )
            .unwrap(),
        }
    }
}

fn outcome(accepted: bool) -> &'static str {
    if accepted {
        "accepted"
    } else {
        "rejected"
    }
}

/// Prometheus-backed metrics recorder.
pub struct PrometheusRecorder {
    metrics: Metrics,
}

impl PrometheusRecorder {
    fn new() -> Self {
        Self {
            metrics: Metrics::new(),
        }
    }
}

impl MetricsRecorder for PrometheusRecorder {
    // ── Storage ──────────────────────────────────────────────────────

    fn record_storage_read(&self, latency_secs: f64) {
        self.metrics.storage_read_latency.observe(latency_secs);
    }

    fn record_storage_write(&self, latency_secs: f64) {
        self.metrics.storage_write_latency.observe(latency_secs);
    }

    fn record_storage_batch_size(&self, size: usize) {
        self.metrics.storage_batch_size.observe(size as f64);
    }

    // ── Application ──────────────────────────────────────────────────

    fn record_tx_checked(&self, accepted: bool) {
        self.metrics
            .txs_checked
            .with_label_values(&[outcome(accepted)])
            .inc();
    }

    fn record_tx_delivered(&self, accepted: bool) {
        self.metrics
            .txs_delivered
            .with_label_values(&[outcome(accepted)])
            .inc();
    }

    fn record_block_committed(&self, height: u64, commit_latency_secs: f64) {
        self.metrics.blocks_committed.inc();
        self.metrics
            .block_commit_latency
            .observe(commit_latency_secs);
        self.metrics.block_height.set(height as f64);
    }

    fn record_query(&self, found: bool) {
        let label = if found { "found" } else { "missing" };
        self.metrics.queries.with_label_values(&[label]).inc();
    }

    fn record_fatal_fault(&self, kind: &str) {
        self.metrics.fatal_faults.with_label_values(&[kind]).inc();
    }
}

/// Install the Prometheus metrics recorder as the global backend.
///
/// Idempotent: only the first call creates and registers the Prometheus
/// metrics.
pub fn install() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        kvstore_metrics::set_global_recorder(Box::new(PrometheusRecorder::new()));
    });
}

/// Gather and encode all registered Prometheus metrics as text format.
///
/// Returns `(content_type, encoded_body)` suitable for an HTTP response.
pub fn encode_metrics() -> Result<(String, Vec<u8>), String> {
    use prometheus::{Encoder, TextEncoder};
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let content_type = encoder.format_type().to_string();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("{e}"))?;
    Ok((content_type, buffer))
}

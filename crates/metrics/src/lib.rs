//! Metrics facade for the key/value application.
//!
//! Provides a [`MetricsRecorder`] trait with domain-specific methods and default
//! no-op implementations. A global singleton recorder is accessed via [`recorder()`],
//! and convenience free functions delegate to it.
//!
//! # Usage
//!
//! Callers record metrics via free functions:
//! ```ignore
//! kvstore_metrics::record_storage_read(latency_secs);
//! kvstore_metrics::record_block_committed(height, latency_secs);
//! ```
//!
//! At startup, install a backend:
//! ```ignore
//! kvstore_metrics_prometheus::install();
//! ```
//!
//! Without a backend every call is a no-op, which is what tests get.

use std::sync::OnceLock;

// ═══════════════════════════════════════════════════════════════════════
// Trait
// ═══════════════════════════════════════════════════════════════════════

/// Domain-specific metrics recording trait.
///
/// All methods have default no-op implementations so backends only need
/// to override the metrics they care about.
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync + 'static {
    // ── Storage ──────────────────────────────────────────────────────

    /// Record a storage read latency.
    fn record_storage_read(&self, latency_secs: f64) {}

    /// Record a storage commit latency.
    fn record_storage_write(&self, latency_secs: f64) {}

    /// Record the number of writes in an atomic commit.
    fn record_storage_batch_size(&self, size: usize) {}

    // ── Application ──────────────────────────────────────────────────

    /// Record an admission check outcome.
    fn record_tx_checked(&self, accepted: bool) {}

    /// Record a block-time transaction outcome.
    fn record_tx_delivered(&self, accepted: bool) {}

    /// Record a block committed.
    fn record_block_committed(&self, height: u64, commit_latency_secs: f64) {}

    /// Record a query outcome.
    fn record_query(&self, found: bool) {}

    /// Record an unrecoverable fault by kind (`protocol` or `storage`).
    fn record_fatal_fault(&self, kind: &str) {}
}

// ═══════════════════════════════════════════════════════════════════════
// Global singleton
// ═══════════════════════════════════════════════════════════════════════

struct NoopRecorder;
impl MetricsRecorder for NoopRecorder {}

static RECORDER: OnceLock<Box<dyn MetricsRecorder>> = OnceLock::new();

/// Install a global metrics recorder.
///
/// Can only be called once. Subsequent calls are silently ignored.
pub fn set_global_recorder(recorder: Box<dyn MetricsRecorder>) {
    let _ = RECORDER.set(recorder);
}

/// Get the global metrics recorder.
///
/// Returns a no-op recorder if none has been installed.
#[inline]
fn recorder() -> &'static dyn MetricsRecorder {
    RECORDER.get().map(|r| r.as_ref()).unwrap_or(&NoopRecorder)
}

// ═══════════════════════════════════════════════════════════════════════
// Convenience free functions
// ═══════════════════════════════════════════════════════════════════════

// ── Storage ──────────────────────────────────────────────────────────

/// Record a storage read latency.
#[inline]
pub fn record_storage_read(latency_secs: f64) {
    recorder().record_storage_read(latency_secs);
}

/// Record a storage commit latency.
#[inline]
pub fn record_storage_write(latency_secs: f64) {
    recorder().record_storage_write(latency_secs);
}

/// Record the number of writes in an atomic commit.
#[inline]
pub fn record_storage_batch_size(size: usize) {
    recorder().record_storage_batch_size(size);
}

// ── Application ──────────────────────────────────────────────────────

/// Record an admission check outcome.
#[inline]
pub fn record_tx_checked(accepted: bool) {
    recorder().record_tx_checked(accepted);
}

/// Record a block-time transaction outcome.
#[inline]
pub fn record_tx_delivered(accepted: bool) {
    recorder().record_tx_delivered(accepted);
}

/// Record a block committed.
#[inline]
pub fn record_block_committed(height: u64, commit_latency_secs: f64) {
    recorder().record_block_committed(height, commit_latency_secs);
}

/// Record a query outcome.
#[inline]
pub fn record_query(found: bool) {
    recorder().record_query(found);
}

/// Record an unrecoverable fault.
#[inline]
pub fn record_fatal_fault(kind: &str) {
    recorder().record_fatal_fault(kind);
}

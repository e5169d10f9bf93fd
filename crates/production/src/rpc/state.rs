//! Shared state for RPC handlers.

use crate::fatal::FatalHandler;
use kvstore_app::{AbciSession, KvStoreApp};
use kvstore_storage::KvStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::error;

/// Shared state for RPC handlers.
pub struct RpcState<S: KvStore + 'static> {
    /// The single callback session. Block callbacks are serialized through
    /// this lock; queries never take it.
    pub session: Arc<Mutex<AbciSession<S>>>,
    /// Application handle for lock-free reads and admission checks.
    pub app: KvStoreApp<S>,
    /// Ready flag for readiness probe.
    pub ready: Arc<AtomicBool>,
    /// Set once a fatal error has been reported. Nothing is served after.
    pub halted: Arc<AtomicBool>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
    /// Where fatal errors go.
    pub fatal: Arc<dyn FatalHandler>,
    /// Serve `GET /metrics`.
    pub metrics_enabled: bool,
}

impl<S: KvStore + 'static> Clone for RpcState<S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            app: self.app.clone(),
            ready: self.ready.clone(),
            halted: self.halted.clone(),
            start_time: self.start_time,
            fatal: self.fatal.clone(),
            metrics_enabled: self.metrics_enabled,
        }
    }
}

impl<S: KvStore + 'static> RpcState<S> {
    /// Fresh state around `app`: no open block, not ready, not halted.
    pub fn new(app: KvStoreApp<S>, fatal: Arc<dyn FatalHandler>, metrics_enabled: bool) -> Self {
        Self {
            session: Arc::new(Mutex::new(AbciSession::new(app.clone()))),
            app,
            ready: Arc::new(AtomicBool::new(false)),
            halted: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
            fatal,
            metrics_enabled,
        }
    }

    /// Whether a fatal error has already been reported.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Stop serving and hand `err` to the fatal handler.
    ///
    /// Callers holding the session lock must halt before releasing it, so no
    /// queued callback runs against a block the fault left half-applied.
    /// Only the first fatal error reaches the handler.
    pub(crate) fn halt(&self, kind: &str, err: &dyn std::error::Error) {
        self.ready.store(false, Ordering::SeqCst);
        if self.halted.swap(true, Ordering::SeqCst) {
            error!(kind, error = %err, "Fatal error after halt");
            return;
        }
        self.fatal.on_fatal(kind, err);
    }
}

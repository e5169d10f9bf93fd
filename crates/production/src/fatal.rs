//! Fail-stop handling.
//!
//! A fatal error means this replica can no longer be trusted to agree with
//! the others: either the application returned [`kvstore_app::AppError`] or a
//! callback panicked part way through. The host reports it to a
//! [`FatalHandler`]; the production handler ends the process.

use parking_lot::Mutex;
use std::error::Error;
use thiserror::Error;
use tracing::error;

/// Fault class reported for a panicking callback.
pub const PANIC_KIND: &str = "panic";

/// A callback panicked, leaving the block phase unknown.
#[derive(Debug, Clone, Error)]
#[error("{method} callback panicked")]
pub struct CallbackPanicked {
    /// The callback that panicked.
    pub method: &'static str,
}

/// Reaction to a fatal error.
pub trait FatalHandler: Send + Sync {
    /// Called once, for the first fatal error, after the host has stopped
    /// serving callbacks.
    ///
    /// `kind` is the fault class: `protocol`, `storage` or `panic`.
    fn on_fatal(&self, kind: &str, error: &dyn Error);
}

/// Terminates the process with exit status 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitOnFatal;

impl FatalHandler for ExitOnFatal {
    fn on_fatal(&self, kind: &str, error: &dyn Error) {
        error!(kind, error = %error, "Fatal application error, exiting");
        std::process::exit(1);
    }
}

/// Records fatal errors instead of exiting, for embedding and tests.
#[derive(Debug, Default)]
pub struct RecordingFatalHandler {
    faults: Mutex<Vec<(String, String)>>,
}

impl RecordingFatalHandler {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// `(kind, message)` of every fatal error seen so far, oldest first.
    pub fn faults(&self) -> Vec<(String, String)> {
        self.faults.lock().clone()
    }
}

impl FatalHandler for RecordingFatalHandler {
    fn on_fatal(&self, kind: &str, error: &dyn Error) {
        self.faults.lock().push((kind.to_string(), error.to_string()));
    }
}

//! RPC response bodies that are not callback responses.

use serde::{Deserialize, Serialize};

/// Liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Readiness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub status: String,
    pub ready: bool,
}

/// `GET /api/v1/status` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusResponse {
    /// Application name reported by `info`.
    pub app: String,
    /// Software version.
    pub version: String,
    /// Protocol version of the application.
    pub app_version: u64,
    /// Number of committed blocks.
    pub last_block_height: u64,
    /// Header height of the block currently open, if any.
    pub open_block_height: Option<u64>,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Whether the node has stopped after a fatal error.
    pub halted: bool,
}

/// Error body for every non-2xx JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Fatal fault class (`protocol`, `storage` or `panic`), when the error was fatal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fatal: None,
        }
    }
}

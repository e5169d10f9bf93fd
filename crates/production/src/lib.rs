//! Production host for the kvstore application.
//!
//! Wires a [`kvstore_app::KvStoreApp`] to a durable store and exposes its
//! callbacks over HTTP:
//!
//! - [`rpc`]: the axum server carrying callbacks, queries and probes
//! - [`config`]: the TOML node configuration and its CLI overrides
//! - [`fatal`]: what the host does when the application reports a fatal fault
//! - [`telemetry`]: `tracing` subscriber setup

pub mod config;
pub mod fatal;
pub mod rpc;
pub mod telemetry;

pub use config::{
    ConfigOverrides, MetricsConfig, NodeConfig, NodeSettings, RpcConfig, TelemetryConfig,
};
pub use fatal::{
    CallbackPanicked, ExitOnFatal, FatalHandler, RecordingFatalHandler, PANIC_KIND,
};
pub use rpc::{RpcServer, RpcServerConfig, RpcServerError, RpcServerHandle, RpcState};
pub use telemetry::init_logging;

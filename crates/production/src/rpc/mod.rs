//! HTTP RPC server for a kvstore node.
//!
//! # Callbacks
//!
//! - `POST /abci` - One callback request (`{"method": "begin_block", ...}`),
//!   one callback response. Byte fields are hex strings. Callbacks run one at
//!   a time through a single [`kvstore_app::AbciSession`].
//!
//! # Reads & Admission
//!
//! - `GET /api/v1/query/{key_hex}` - Point read of committed state
//! - `GET /api/v1/query` - Point read of the empty key
//! - `POST /api/v1/check_tx` - Admission check for a transaction
//!
//! # Health & Observability
//!
//! - `GET /health` - Liveness probe (always returns 200 if server running)
//! - `GET /ready` - Readiness probe (200 once started, 503 before or after a fatal error)
//! - `GET /api/v1/status` - Committed height, open block, uptime
//! - `GET /metrics` - Prometheus metrics in text format
//!
//! # Fatal errors
//!
//! A callback that returns [`kvstore_app::AppError`] or panics gets a 500
//! response and the configured [`crate::FatalHandler`] is invoked. The node
//! is marked halted before the session lock is released, so every later
//! request, including ones already queued, is refused with 503.

mod handlers;
mod routes;
mod server;
mod state;
mod types;

pub use routes::create_router;
pub use server::{RpcServer, RpcServerConfig, RpcServerError, RpcServerHandle};
pub use state::RpcState;
pub use types::*;

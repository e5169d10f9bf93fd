//! Replicated key/value application state machine.
//!
//! A consensus driver feeds this crate one callback at a time. Transactions
//! are raw `key=value` bytes; well-formed ones are staged into the open
//! block and become visible to queries, all together, when the block commits.
//!
//! - [`KvStoreApp`]: the callbacks, with the open block as an explicit
//!   [`PendingBlock`] value
//! - [`AbciSession`]: a dispatcher for transports that deliver callbacks as
//!   [`kvstore_types::Request`] values and need ordering checked at runtime
//! - [`validator`]: the stateless format check shared by admission and delivery
//!
//! # Failure model
//!
//! Rejected transactions are ordinary responses with a non-zero code.
//! Anything else that goes wrong (a storage fault or a misordered callback)
//! surfaces as [`AppError`], which is always fatal: the host must stop the
//! process rather than continue from a state other replicas may not share.

#![warn(missing_docs)]

mod app;
mod block;
mod error;
mod session;
pub mod validator;

pub use app::{KvStoreApp, APP_NAME, APP_VERSION, LOG_EXISTS, LOG_MISSING};
pub use block::PendingBlock;
pub use error::{AppError, FatalError, ProtocolViolation, StorageOp};
pub use session::{AbciSession, BlockPhase};

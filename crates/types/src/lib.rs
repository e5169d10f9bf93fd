//! Core types for the kvstore application.
//!
//! This crate provides the foundational types shared by the application
//! state machine, the storage backends and the RPC transport:
//!
//! - **Transactions**: raw `key=value` byte payloads and their format rules
//! - **Identifiers**: [`BlockHeight`]
//! - **Callback protocol**: one request/response pair per callback the
//!   consensus driver invokes, plus the [`Request`]/[`Response`] envelopes
//!   used to carry them over a transport
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod identifiers;
mod protocol;
pub mod serde_hex;
mod transaction;

pub use identifiers::BlockHeight;
pub use protocol::{
    ApplySnapshotChunkResult, BlockHeader, CheckTxKind, OfferSnapshotResult, ProposalStatus,
    Request, RequestApplySnapshotChunk, RequestBeginBlock, RequestCheckTx, RequestCommit,
    RequestDeliverTx, RequestEndBlock, RequestInfo, RequestInitChain, RequestListSnapshots,
    RequestLoadSnapshotChunk, RequestOfferSnapshot, RequestPrepareProposal,
    RequestProcessProposal, RequestQuery, Response, ResponseApplySnapshotChunk,
    ResponseBeginBlock, ResponseCheckTx, ResponseCommit, ResponseDeliverTx, ResponseEndBlock,
    ResponseInfo, ResponseInitChain, ResponseListSnapshots, ResponseLoadSnapshotChunk,
    ResponseOfferSnapshot, ResponsePrepareProposal, ResponseProcessProposal, ResponseQuery,
    Snapshot,
};
pub use transaction::{FormatError, Transaction, TxKeyValue, SEPARATOR};

/// Result code for an accepted transaction.
pub const CODE_OK: u32 = 0;

/// Result code for a transaction that does not split into exactly one key and one value.
///
/// The code is not further differentiated: every malformed transaction gets it.
pub const CODE_INVALID_FORMAT: u32 = 1;

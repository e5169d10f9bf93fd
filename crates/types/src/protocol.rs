//! Callback protocol between the consensus driver and the application.
//!
//! One request/response pair per callback. The pairs are plain data; the
//! [`Request`] and [`Response`] envelopes tag them with a `method` field so a
//! transport can carry any callback over a single channel:
//!
//! ```json
//! {"method": "deliver_tx", "tx": "616c6963653d313030"}
//! {"method": "deliver_tx", "code": 0, "log": ""}
//! ```
//!
//! All byte fields (transactions, keys, values, hashes) are hex-encoded.
//! Every field has a default, so a transport request only needs to carry the
//! fields it cares about.

use crate::{serde_hex, BlockHeight, Transaction, CODE_OK};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// Connection / handshake
// ═══════════════════════════════════════════════════════════════════════

/// Handshake request carrying the driver's version information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestInfo {
    /// Driver software version.
    pub version: String,
    /// Block protocol version.
    pub block_version: u64,
    /// P2P protocol version.
    pub p2p_version: u64,
}

/// Static application descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseInfo {
    /// Free-form application name.
    pub data: String,
    /// Application software version.
    pub version: String,
    /// Application protocol version.
    pub app_version: u64,
    /// Number of blocks committed to the store so far.
    pub last_block_height: BlockHeight,
}

/// Genesis parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestInitChain {
    /// Chain identifier.
    pub chain_id: String,
    /// Height of the first block.
    pub initial_height: u64,
    /// Opaque genesis application state.
    #[serde(with = "serde_hex")]
    pub app_state_bytes: Vec<u8>,
}

/// Empty acknowledgement of chain initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInitChain {}

// ═══════════════════════════════════════════════════════════════════════
// Mempool
// ═══════════════════════════════════════════════════════════════════════

/// Whether a check is for a fresh transaction or a re-check after a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckTxKind {
    /// First time the transaction is seen.
    #[default]
    New,
    /// Re-validation of a transaction already in the mempool.
    Recheck,
}

/// Admission check for a candidate transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestCheckTx {
    /// Raw transaction bytes.
    pub tx: Transaction,
    /// Fresh check or re-check.
    pub kind: CheckTxKind,
}

/// Admission verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseCheckTx {
    /// 0 accepts the transaction, anything else rejects it.
    pub code: u32,
    /// Human-readable reason for a rejection.
    pub log: String,
}

impl ResponseCheckTx {
    /// Whether the transaction was admitted.
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Proposals
// ═══════════════════════════════════════════════════════════════════════

/// Candidate transactions for a block this node is about to propose.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestPrepareProposal {
    /// Transactions selected by the driver, in order.
    pub txs: Vec<Transaction>,
    /// Upper bound on the total transaction bytes of the proposal.
    pub max_tx_bytes: i64,
    /// Height of the proposed block.
    pub height: u64,
}

/// Transactions to include in the proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsePrepareProposal {
    /// Transactions, in order.
    pub txs: Vec<Transaction>,
}

/// A block proposed by another node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestProcessProposal {
    /// Transactions in the proposed block.
    pub txs: Vec<Transaction>,
    /// Height of the proposed block.
    pub height: u64,
}

/// Verdict on a proposed block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Unset.
    #[default]
    Unknown,
    /// Vote for the proposal.
    Accept,
    /// Vote against the proposal.
    Reject,
}

/// Response to [`RequestProcessProposal`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseProcessProposal {
    /// Accept or reject.
    pub status: ProposalStatus,
}

// ═══════════════════════════════════════════════════════════════════════
// Block execution
// ═══════════════════════════════════════════════════════════════════════

/// Header fields of a finalized block that the application sees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockHeader {
    /// Chain identifier.
    pub chain_id: String,
    /// Block height as assigned by the driver.
    pub height: u64,
    /// Block timestamp in unix milliseconds.
    pub time_ms: u64,
    /// Address of the proposer.
    #[serde(with = "serde_hex")]
    pub proposer_address: Vec<u8>,
}

/// Start of a finalized block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestBeginBlock {
    /// Block hash.
    #[serde(with = "serde_hex")]
    pub hash: Vec<u8>,
    /// Block header.
    pub header: BlockHeader,
}

/// Empty acknowledgement of a block start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBeginBlock {}

/// One transaction of the open block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDeliverTx {
    /// Raw transaction bytes.
    pub tx: Transaction,
}

/// Outcome of applying one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseDeliverTx {
    /// 0 when the write was staged, anything else when it was skipped.
    pub code: u32,
    /// Human-readable reason for a skip.
    pub log: String,
}

impl ResponseDeliverTx {
    /// Whether the transaction's write was staged.
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

/// No further transactions will be delivered for the open block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestEndBlock {
    /// Height of the block being ended.
    pub height: u64,
}

/// Empty acknowledgement of a block end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEndBlock {}

/// Persist the open block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCommit {}

/// Commit acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseCommit {
    /// Application state commitment. Always empty for this application.
    #[serde(with = "serde_hex")]
    pub data: Vec<u8>,
}

// ═══════════════════════════════════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════════════════════════════════

/// Point lookup against committed state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestQuery {
    /// Key to look up.
    #[serde(with = "serde_hex")]
    pub data: Vec<u8>,
    /// Query path. Unused; every query is a point lookup.
    pub path: String,
    /// Requested height. Unused; queries always read the latest commit.
    pub height: u64,
    /// Whether a proof was requested. Proofs are not produced.
    pub prove: bool,
}

/// Result of a point lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseQuery {
    /// Always 0; a missing key is not an error.
    pub code: u32,
    /// Existence marker: `"exists"` or `"key does not exist"`.
    pub log: String,
    /// The key that was looked up.
    #[serde(with = "serde_hex")]
    pub key: Vec<u8>,
    /// Committed value, if the key exists.
    #[serde(with = "serde_hex::option")]
    pub value: Option<Vec<u8>>,
    /// Committed height the read was served from.
    pub height: BlockHeight,
}

impl ResponseQuery {
    /// Whether the key exists in committed state.
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// State sync
// ═══════════════════════════════════════════════════════════════════════

/// Snapshot descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Height the snapshot was taken at.
    pub height: u64,
    /// Application-specific format.
    pub format: u32,
    /// Number of chunks.
    pub chunks: u32,
    /// Snapshot hash.
    #[serde(with = "serde_hex")]
    pub hash: Vec<u8>,
    /// Application-specific metadata.
    #[serde(with = "serde_hex")]
    pub metadata: Vec<u8>,
}

/// List locally available snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestListSnapshots {}

/// Locally available snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseListSnapshots {
    /// Snapshots, newest first.
    pub snapshots: Vec<Snapshot>,
}

/// A snapshot offered by a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOfferSnapshot {
    /// Offered snapshot.
    pub snapshot: Option<Snapshot>,
    /// Trusted application hash at the snapshot height.
    #[serde(with = "serde_hex")]
    pub app_hash: Vec<u8>,
}

/// Verdict on an offered snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferSnapshotResult {
    /// Unset.
    #[default]
    Unknown,
    /// Restore from this snapshot.
    Accept,
    /// Abort state sync.
    Abort,
    /// Reject this snapshot.
    Reject,
    /// Reject every snapshot of this format.
    RejectFormat,
    /// Reject every snapshot from this sender.
    RejectSender,
}

/// Response to [`RequestOfferSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseOfferSnapshot {
    /// Verdict.
    pub result: OfferSnapshotResult,
}

/// Request one chunk of a local snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLoadSnapshotChunk {
    /// Snapshot height.
    pub height: u64,
    /// Snapshot format.
    pub format: u32,
    /// Chunk index.
    pub chunk: u32,
}

/// Chunk contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseLoadSnapshotChunk {
    /// Chunk bytes; empty when the chunk is unavailable.
    #[serde(with = "serde_hex")]
    pub chunk: Vec<u8>,
}

/// Apply one chunk of an accepted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestApplySnapshotChunk {
    /// Chunk index.
    pub index: u32,
    /// Chunk bytes.
    #[serde(with = "serde_hex")]
    pub chunk: Vec<u8>,
    /// Peer that sent the chunk.
    pub sender: String,
}

/// Outcome of applying a chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplySnapshotChunkResult {
    /// Unset.
    #[default]
    Unknown,
    /// Chunk applied.
    Accept,
    /// Abort state sync.
    Abort,
    /// Retry this chunk.
    Retry,
    /// Retry the whole snapshot.
    RetrySnapshot,
    /// Reject the snapshot.
    RejectSnapshot,
}

/// Response to [`RequestApplySnapshotChunk`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseApplySnapshotChunk {
    /// Outcome.
    pub result: ApplySnapshotChunkResult,
    /// Chunks to fetch again.
    pub refetch_chunks: Vec<u32>,
    /// Peers to stop fetching from.
    pub reject_senders: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// Envelopes
// ═══════════════════════════════════════════════════════════════════════

/// Any callback request, tagged by `method`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    Info(RequestInfo),
    CheckTx(RequestCheckTx),
    InitChain(RequestInitChain),
    PrepareProposal(RequestPrepareProposal),
    ProcessProposal(RequestProcessProposal),
    BeginBlock(RequestBeginBlock),
    DeliverTx(RequestDeliverTx),
    EndBlock(RequestEndBlock),
    Commit(RequestCommit),
    Query(RequestQuery),
    ListSnapshots(RequestListSnapshots),
    OfferSnapshot(RequestOfferSnapshot),
    LoadSnapshotChunk(RequestLoadSnapshotChunk),
    ApplySnapshotChunk(RequestApplySnapshotChunk),
}

/// Any callback response, tagged by `method`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Response {
    Info(ResponseInfo),
    CheckTx(ResponseCheckTx),
    InitChain(ResponseInitChain),
    PrepareProposal(ResponsePrepareProposal),
    ProcessProposal(ResponseProcessProposal),
    BeginBlock(ResponseBeginBlock),
    DeliverTx(ResponseDeliverTx),
    EndBlock(ResponseEndBlock),
    Commit(ResponseCommit),
    Query(ResponseQuery),
    ListSnapshots(ResponseListSnapshots),
    OfferSnapshot(ResponseOfferSnapshot),
    LoadSnapshotChunk(ResponseLoadSnapshotChunk),
    ApplySnapshotChunk(ResponseApplySnapshotChunk),
}

impl Request {
    /// Wire name of the callback, as used in the `method` tag.
    pub fn method(&self) -> &'static str {
        match self {
            Request::Info(_) => "info",
            Request::CheckTx(_) => "check_tx",
            Request::InitChain(_) => "init_chain",
            Request::PrepareProposal(_) => "prepare_proposal",
            Request::ProcessProposal(_) => "process_proposal",
            Request::BeginBlock(_) => "begin_block",
            Request::DeliverTx(_) => "deliver_tx",
            Request::EndBlock(_) => "end_block",
            Request::Commit(_) => "commit",
            Request::Query(_) => "query",
            Request::ListSnapshots(_) => "list_snapshots",
            Request::OfferSnapshot(_) => "offer_snapshot",
            Request::LoadSnapshotChunk(_) => "load_snapshot_chunk",
            Request::ApplySnapshotChunk(_) => "apply_snapshot_chunk",
        }
    }
}

macro_rules! impl_from_response {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Response {
                fn from(response: $ty) -> Self {
                    Response::$variant(response)
                }
            }
        )*
    };
}

impl_from_response!(
    Info(ResponseInfo),
    CheckTx(ResponseCheckTx),
    InitChain(ResponseInitChain),
    PrepareProposal(ResponsePrepareProposal),
    ProcessProposal(ResponseProcessProposal),
    BeginBlock(ResponseBeginBlock),
    DeliverTx(ResponseDeliverTx),
    EndBlock(ResponseEndBlock),
    Commit(ResponseCommit),
    Query(ResponseQuery),
    ListSnapshots(ResponseListSnapshots),
    OfferSnapshot(ResponseOfferSnapshot),
    LoadSnapshotChunk(ResponseLoadSnapshotChunk),
    ApplySnapshotChunk(ResponseApplySnapshotChunk),
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tagged_by_method() {
        let request: Request =
            serde_json::from_str(r#"{"method":"deliver_tx","tx":"616c6963653d313030"}"#).unwrap();
        assert_eq!(
            request,
            Request::DeliverTx(RequestDeliverTx {
                tx: Transaction::from("alice=100"),
            })
        );
        assert_eq!(request.method(), "deliver_tx");
    }

    #[test]
    fn test_empty_request_needs_only_method() {
        let request: Request = serde_json::from_str(r#"{"method":"commit"}"#).unwrap();
        assert_eq!(request, Request::Commit(RequestCommit {}));

        let request: Request = serde_json::from_str(r#"{"method":"begin_block"}"#).unwrap();
        assert_eq!(request, Request::BeginBlock(RequestBeginBlock::default()));
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"method":"flush"}"#).is_err());
    }

    #[test]
    fn test_query_response_encodes_missing_value_as_null() {
        let response = Response::from(ResponseQuery {
            code: 0,
            log: "key does not exist".to_string(),
            key: b"bob".to_vec(),
            value: None,
            height: BlockHeight(3),
        });
        let json: serde_json::Value = serde_json::to_value(&response).unwrap();
        assert_eq!(json["method"], "query");
        assert_eq!(json["key"], "626f62");
        assert!(json["value"].is_null());
        assert_eq!(json["height"], 3);
    }

    #[test]
    fn test_query_response_keeps_empty_value_distinct_from_missing() {
        let json = r#"{"method":"query","key":"6b","value":"","log":"exists"}"#;
        let Response::Query(response) = serde_json::from_str::<Response>(json).unwrap() else {
            panic!("expected a query response");
        };
        assert!(response.exists());
        assert_eq!(response.value, Some(Vec::new()));
    }
}

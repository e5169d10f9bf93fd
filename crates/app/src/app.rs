//! The key/value application state machine.
//!
//! # Block lifecycle
//!
//! ```text
//! begin_block ──► PendingBlock ──► deliver_tx (0..N) ──► end_block ──► commit
//!                     │                                                 │
//!                     └──────── staged writes, invisible to queries ────┘
//!                                                                       ▼
//!                                                         committed state + height
//! ```
//!
//! The open block is a value, not a field: [`KvStoreApp::begin_block`]
//! returns it and [`KvStoreApp::commit`] consumes it, so the type system
//! rules out committing a block twice or delivering into a committed one.
//! Queries read through [`KvStore::snapshot`] and never see a pending block.

use crate::block::PendingBlock;
use crate::error::{AppError, StorageOp};
use crate::validator::{self, Verdict};
use kvstore_storage::{KvStore, ReadView, WriteScope};
use kvstore_types::{
    ApplySnapshotChunkResult, OfferSnapshotResult, ProposalStatus, RequestApplySnapshotChunk,
    RequestBeginBlock, RequestCheckTx, RequestDeliverTx, RequestEndBlock, RequestInfo,
    RequestInitChain, RequestListSnapshots, RequestLoadSnapshotChunk, RequestOfferSnapshot,
    RequestPrepareProposal, RequestProcessProposal, RequestQuery, ResponseApplySnapshotChunk,
    ResponseBeginBlock, ResponseCheckTx, ResponseCommit, ResponseDeliverTx, ResponseEndBlock,
    ResponseInfo, ResponseInitChain, ResponseListSnapshots, ResponseLoadSnapshotChunk,
    ResponseOfferSnapshot, ResponsePrepareProposal, ResponseProcessProposal, ResponseQuery,
    CODE_OK,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Level};

/// Name reported by `info`.
pub const APP_NAME: &str = "kvstore";

/// Application protocol version reported by `info`.
pub const APP_VERSION: u64 = 1;

/// Query log for a key present in committed state.
pub const LOG_EXISTS: &str = "exists";

/// Query log for a key absent from committed state.
pub const LOG_MISSING: &str = "key does not exist";

/// Replicated key/value ledger driven by a consensus engine.
///
/// Holds only a shared handle to the store; all per-block state travels in
/// the [`PendingBlock`] the caller owns. `&self` methods can therefore run
/// concurrently, and queries never wait on the block lifecycle.
pub struct KvStoreApp<S> {
    store: Arc<S>,
}

impl<S> Clone for KvStoreApp<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KvStore> KvStoreApp<S> {
    /// Create an application over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ═══════════════════════════════════════════════════════════════════
    // Handshake
    // ═══════════════════════════════════════════════════════════════════

    /// Static descriptor plus the number of committed blocks.
    pub fn info(&self, request: &RequestInfo) -> Result<ResponseInfo, AppError> {
        let last_block_height = self
            .store
            .committed_height()
            .map_err(|e| fault(AppError::storage(StorageOp::Read, e)))?;
        debug!(driver_version = %request.version, %last_block_height, "info");
        Ok(ResponseInfo {
            data: APP_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            app_version: APP_VERSION,
            last_block_height,
        })
    }

    /// Genesis acknowledgement. No genesis state is loaded.
    pub fn init_chain(&self, request: &RequestInitChain) -> ResponseInitChain {
        info!(chain_id = %request.chain_id, initial_height = request.initial_height, "init chain");
        ResponseInitChain {}
    }

    // ═══════════════════════════════════════════════════════════════════
    // Admission
    // ═══════════════════════════════════════════════════════════════════

    /// Format check before a transaction enters the mempool.
    ///
    /// Touches no state; a rejection only keeps the transaction out of blocks.
    pub fn check_tx(&self, request: &RequestCheckTx) -> ResponseCheckTx {
        let verdict = validator::validate(&request.tx);
        kvstore_metrics::record_tx_checked(verdict.is_accept());
        debug!(
            kind = ?request.kind,
            tx_len = request.tx.len(),
            code = verdict.code(),
            "check tx"
        );
        ResponseCheckTx {
            code: verdict.code(),
            log: verdict.log().to_string(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Proposals
    // ═══════════════════════════════════════════════════════════════════

    /// Propose the candidate transactions unchanged.
    pub fn prepare_proposal(&self, request: RequestPrepareProposal) -> ResponsePrepareProposal {
        ResponsePrepareProposal { txs: request.txs }
    }

    /// Accept every proposal. Malformed transactions are rejected individually
    /// at delivery.
    pub fn process_proposal(&self, request: &RequestProcessProposal) -> ResponseProcessProposal {
        debug!(height = request.height, txs = request.txs.len(), "process proposal");
        ResponseProcessProposal {
            status: ProposalStatus::Accept,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Block lifecycle
    // ═══════════════════════════════════════════════════════════════════

    /// Open a fresh write scope for the block.
    ///
    /// This method does not check that no other block is open: two
    /// [`PendingBlock`]s taken from the same app (or its clones) commit
    /// independently, each advancing the height. Callers driving the app
    /// directly must keep at most one block open. Drivers that cannot
    /// guarantee ordering should go through [`crate::AbciSession`], which
    /// rejects a second `begin_block` as a protocol violation.
    pub fn begin_block(
        &self,
        request: &RequestBeginBlock,
    ) -> (PendingBlock<S::WriteScope>, ResponseBeginBlock) {
        let height = request.header.height;
        debug!(height, "begin block");
        (
            PendingBlock::new(self.store.begin_write(), height),
            ResponseBeginBlock {},
        )
    }

    /// Re-validate and stage one transaction.
    ///
    /// A malformed transaction returns a non-zero code and stages nothing. A
    /// failure to stage a well-formed one is fatal.
    pub fn deliver_tx(
        &self,
        block: &mut PendingBlock<S::WriteScope>,
        request: &RequestDeliverTx,
    ) -> Result<ResponseDeliverTx, AppError> {
        let verdict = validator::validate(&request.tx);
        kvstore_metrics::record_tx_delivered(verdict.is_accept());

        match verdict {
            Verdict::Accept(kv) => {
                block
                    .scope
                    .set(kv.key, kv.value)
                    .map_err(|e| fault(AppError::storage(StorageOp::Stage, e)))?;
                block.record_accepted();
                debug!(
                    height = block.height(),
                    key_len = kv.key.len(),
                    value_len = kv.value.len(),
                    staged = block.staged_count(),
                    "staged tx"
                );
            }
            Verdict::Reject(reason) => {
                block.record_rejected();
                warn!(height = block.height(), %reason, "rejected tx at delivery");
            }
        }

        Ok(ResponseDeliverTx {
            code: verdict.code(),
            log: verdict.log().to_string(),
        })
    }

    /// Marks the end of delivery. Carries no state change.
    pub fn end_block(
        &self,
        block: &PendingBlock<S::WriteScope>,
        request: &RequestEndBlock,
    ) -> ResponseEndBlock {
        debug!(
            height = request.height,
            accepted = block.accepted(),
            rejected = block.rejected(),
            "end block"
        );
        ResponseEndBlock {}
    }

    /// Atomically commit the block's writes.
    ///
    /// Consumes the block. Failure is fatal; nothing staged becomes visible.
    #[instrument(level = Level::DEBUG, skip_all, fields(height = block.height()))]
    pub fn commit(&self, block: PendingBlock<S::WriteScope>) -> Result<ResponseCommit, AppError> {
        let opened_at = block.opened_at();
        let header_height = block.height();
        let (accepted, rejected) = (block.accepted(), block.rejected());

        let result = self
            .store
            .commit(block.scope)
            .map_err(|e| fault(AppError::storage(StorageOp::Commit, e)))?;

        kvstore_metrics::record_block_committed(
            result.height.0,
            opened_at.elapsed().as_secs_f64(),
        );
        info!(
            header_height,
            committed_height = %result.height,
            writes = result.writes,
            accepted,
            rejected,
            "committed block"
        );

        Ok(ResponseCommit { data: Vec::new() })
    }

    // ═══════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════

    /// Point read against the latest committed state.
    ///
    /// Reads through an isolated snapshot, so an open block is never visible.
    pub fn query(&self, request: &RequestQuery) -> Result<ResponseQuery, AppError> {
        let snapshot = self.store.snapshot();
        let value = snapshot
            .get(&request.data)
            .map_err(|e| fault(AppError::storage(StorageOp::Read, e)))?;
        let height = snapshot
            .committed_height()
            .map_err(|e| fault(AppError::storage(StorageOp::Read, e)))?;

        kvstore_metrics::record_query(value.is_some());
        debug!(key_len = request.data.len(), found = value.is_some(), %height, "query");

        let log = match value {
            Some(_) => LOG_EXISTS,
            None => LOG_MISSING,
        };
        Ok(ResponseQuery {
            code: CODE_OK,
            log: log.to_string(),
            key: request.data.clone(),
            value,
            height,
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // State sync
    // ═══════════════════════════════════════════════════════════════════

    /// No snapshots are offered.
    pub fn list_snapshots(&self, _request: &RequestListSnapshots) -> ResponseListSnapshots {
        ResponseListSnapshots::default()
    }

    /// Snapshot offers are acknowledged without a decision.
    pub fn offer_snapshot(&self, _request: &RequestOfferSnapshot) -> ResponseOfferSnapshot {
        ResponseOfferSnapshot {
            result: OfferSnapshotResult::Unknown,
        }
    }

    /// No chunks are served.
    pub fn load_snapshot_chunk(
        &self,
        _request: &RequestLoadSnapshotChunk,
    ) -> ResponseLoadSnapshotChunk {
        ResponseLoadSnapshotChunk::default()
    }

    /// Chunks are acknowledged without being applied.
    pub fn apply_snapshot_chunk(
        &self,
        _request: &RequestApplySnapshotChunk,
    ) -> ResponseApplySnapshotChunk {
        ResponseApplySnapshotChunk {
            result: ApplySnapshotChunkResult::Unknown,
            ..Default::default()
        }
    }
}

/// Log and count a fatal fault on its way out.
pub(crate) fn fault(err: AppError) -> AppError {
    kvstore_metrics::record_fatal_fault(err.fatal().kind());
    error!(error = %err, "fatal fault");
    err
}

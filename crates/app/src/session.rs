//! Callback dispatcher that tracks the block phase.
//!
//! [`KvStoreApp`] makes misordered callbacks impossible to express in Rust.
//! A transport, however, delivers callbacks as data, so [`AbciSession`] owns
//! the open block on the driver's behalf and turns ordering mistakes into
//! [`ProtocolViolation`]s.

use crate::app::{fault, KvStoreApp};
use crate::block::PendingBlock;
use crate::error::{AppError, ProtocolViolation};
use kvstore_storage::KvStore;
use kvstore_types::{Request, Response};

/// Where the session is in the block lifecycle.
pub enum BlockPhase<W> {
    /// No block open.
    Idle,
    /// A block is open and accepting deliveries.
    Open(PendingBlock<W>),
}

/// Stateful front end for one consensus connection.
pub struct AbciSession<S: KvStore> {
    app: KvStoreApp<S>,
    phase: BlockPhase<S::WriteScope>,
}

impl<S: KvStore> AbciSession<S> {
    /// Start a session with no open block.
    pub fn new(app: KvStoreApp<S>) -> Self {
        Self {
            app,
            phase: BlockPhase::Idle,
        }
    }

    /// The application behind this session.
    pub fn app(&self) -> &KvStoreApp<S> {
        &self.app
    }

    /// Header height of the open block, if any.
    pub fn open_height(&self) -> Option<u64> {
        match &self.phase {
            BlockPhase::Idle => None,
            BlockPhase::Open(block) => Some(block.height()),
        }
    }

    /// Dispatch one callback.
    ///
    /// `Err` is always fatal: the caller must stop feeding this session and
    /// terminate.
    pub fn handle(&mut self, request: Request) -> Result<Response, AppError> {
        let response = match request {
            Request::Info(req) => self.app.info(&req)?.into(),
            Request::CheckTx(req) => self.app.check_tx(&req).into(),
            Request::InitChain(req) => self.app.init_chain(&req).into(),
            Request::PrepareProposal(req) => self.app.prepare_proposal(req).into(),
            Request::ProcessProposal(req) => self.app.process_proposal(&req).into(),
            Request::Query(req) => self.app.query(&req)?.into(),

            Request::BeginBlock(req) => {
                if let BlockPhase::Open(open) = &self.phase {
                    return Err(fault(
                        ProtocolViolation::BlockAlreadyOpen {
                            open: open.height(),
                            attempted: req.header.height,
                        }
                        .into(),
                    ));
                }
                let (block, response) = self.app.begin_block(&req);
                self.phase = BlockPhase::Open(block);
                response.into()
            }
            Request::DeliverTx(req) => {
                let BlockPhase::Open(block) = &mut self.phase else {
                    return Err(no_open_block("deliver_tx"));
                };
                self.app.deliver_tx(block, &req)?.into()
            }
            Request::EndBlock(req) => {
                let BlockPhase::Open(block) = &self.phase else {
                    return Err(no_open_block("end_block"));
                };
                self.app.end_block(block, &req).into()
            }
            Request::Commit(_) => {
                let BlockPhase::Open(block) = std::mem::replace(&mut self.phase, BlockPhase::Idle)
                else {
                    return Err(no_open_block("commit"));
                };
                self.app.commit(block)?.into()
            }

            Request::ListSnapshots(req) => self.app.list_snapshots(&req).into(),
            Request::OfferSnapshot(req) => self.app.offer_snapshot(&req).into(),
            Request::LoadSnapshotChunk(req) => self.app.load_snapshot_chunk(&req).into(),
            Request::ApplySnapshotChunk(req) => self.app.apply_snapshot_chunk(&req).into(),
        };
        Ok(response)
    }
}

fn no_open_block(callback: &'static str) -> AppError {
    fault(ProtocolViolation::NoOpenBlock { callback }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FatalError;
    use kvstore_storage_memory::MemStorage;
    use kvstore_types::{
        BlockHeader, RequestBeginBlock, RequestCommit, RequestDeliverTx, RequestEndBlock,
        RequestQuery, Transaction,
    };
    use std::sync::Arc;

    fn session() -> AbciSession<MemStorage> {
        AbciSession::new(KvStoreApp::new(Arc::new(MemStorage::new())))
    }

    fn begin(height: u64) -> Request {
        Request::BeginBlock(RequestBeginBlock {
            header: BlockHeader {
                height,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn deliver(raw: &str) -> Request {
        Request::DeliverTx(RequestDeliverTx {
            tx: Transaction::from(raw),
        })
    }

    fn protocol_violation(err: AppError) -> ProtocolViolation {
        match err.fatal() {
            FatalError::Protocol(violation) => violation.clone(),
            other => panic!("expected protocol violation, got {other}"),
        }
    }

    #[test]
    fn test_full_block_cycle() {
        let mut session = session();
        session.handle(begin(1)).unwrap();
        assert_eq!(session.open_height(), Some(1));

        let Response::DeliverTx(delivered) = session.handle(deliver("alice=100")).unwrap() else {
            panic!("wrong response variant");
        };
        assert!(delivered.is_ok());

        session
            .handle(Request::EndBlock(RequestEndBlock { height: 1 }))
            .unwrap();
        let Response::Commit(commit) = session.handle(Request::Commit(RequestCommit {})).unwrap()
        else {
            panic!("wrong response variant");
        };
        assert!(commit.data.is_empty());
        assert_eq!(session.open_height(), None);

        let Response::Query(query) = session
            .handle(Request::Query(RequestQuery {
                data: b"alice".to_vec(),
                ..Default::default()
            }))
            .unwrap()
        else {
            panic!("wrong response variant");
        };
        assert_eq!(query.value, Some(b"100".to_vec()));
    }

    #[test]
    fn test_begin_while_open_is_fatal() {
        let mut session = session();
        session.handle(begin(1)).unwrap();
        let err = session.handle(begin(2)).unwrap_err();
        assert_eq!(
            protocol_violation(err),
            ProtocolViolation::BlockAlreadyOpen {
                open: 1,
                attempted: 2
            }
        );
    }

    #[test]
    fn test_block_callbacks_while_idle_are_fatal() {
        let mut session = session();

        let err = session.handle(deliver("a=1")).unwrap_err();
        assert_eq!(
            protocol_violation(err),
            ProtocolViolation::NoOpenBlock {
                callback: "deliver_tx"
            }
        );

        let err = session
            .handle(Request::EndBlock(RequestEndBlock::default()))
            .unwrap_err();
        assert_eq!(
            protocol_violation(err),
            ProtocolViolation::NoOpenBlock {
                callback: "end_block"
            }
        );

        let err = session
            .handle(Request::Commit(RequestCommit {}))
            .unwrap_err();
        assert_eq!(
            protocol_violation(err),
            ProtocolViolation::NoOpenBlock { callback: "commit" }
        );
    }

    #[test]
    fn test_double_commit_is_fatal() {
        let mut session = session();
        session.handle(begin(1)).unwrap();
        session.handle(Request::Commit(RequestCommit {})).unwrap();
        assert!(session.handle(Request::Commit(RequestCommit {})).is_err());
    }

    #[test]
    fn test_stateless_callbacks_work_mid_block() {
        let mut session = session();
        session.handle(begin(1)).unwrap();
        session.handle(deliver("k=v")).unwrap();

        let Response::Query(query) = session
            .handle(Request::Query(RequestQuery {
                data: b"k".to_vec(),
                ..Default::default()
            }))
            .unwrap()
        else {
            panic!("wrong response variant");
        };
        assert!(!query.exists());
        assert_eq!(session.open_height(), Some(1));
    }
}

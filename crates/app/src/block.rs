//! The open block.

use kvstore_storage::WriteScope;
use std::time::Instant;

/// The single in-progress write scope for one block.
///
/// Returned by `begin_block`, borrowed mutably by `deliver_tx`, consumed by
/// `commit`. Dropping it discards every staged write.
pub struct PendingBlock<W> {
    pub(crate) scope: W,
    height: u64,
    opened_at: Instant,
    accepted: usize,
    rejected: usize,
}

impl<W: WriteScope> PendingBlock<W> {
    pub(crate) fn new(scope: W, height: u64) -> Self {
        Self {
            scope,
            height,
            opened_at: Instant::now(),
            accepted: 0,
            rejected: 0,
        }
    }

    /// Height from the block header.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Writes staged so far.
    pub fn staged_count(&self) -> usize {
        self.scope.staged_count()
    }

    /// Transactions delivered and staged.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Transactions delivered and rejected.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub(crate) fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub(crate) fn record_accepted(&mut self) {
        self.accepted += 1;
    }

    pub(crate) fn record_rejected(&mut self) {
        self.rejected += 1;
    }
}

impl<W> std::fmt::Debug for PendingBlock<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingBlock")
            .field("height", &self.height)
            .field("accepted", &self.accepted)
            .field("rejected", &self.rejected)
            .finish()
    }
}

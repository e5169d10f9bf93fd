//! Commit results.

use kvstore_types::BlockHeight;

/// Result of committing a block's write scope.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResult {
    /// The committed height after commit.
    pub height: BlockHeight,
    /// Number of set operations applied.
    pub writes: usize,
}

//! Storage traits for the key/value ledger.

use crate::CommitResult;
use kvstore_types::BlockHeight;
use thiserror::Error;

/// Error type for storage operations.
///
/// The application treats every variant as unrecoverable; the distinction
/// exists for diagnostics.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying database reported an I/O or engine failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored metadata could not be decoded.
    #[error("Corrupted metadata at {key}: {reason}")]
    Corruption {
        /// Metadata key that failed to decode.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Staging a write would exceed the write scope's byte limit.
    #[error("Write scope full: staging {attempted} bytes would exceed limit of {limit} bytes")]
    WriteScopeFull {
        /// Configured limit in bytes.
        limit: usize,
        /// Staged bytes the write would have produced.
        attempted: usize,
    },
}

/// Point-in-time read access to committed state.
pub trait ReadView {
    /// Read the committed value for `key`.
    ///
    /// `Ok(None)` means the key is absent. `Err` means the read itself failed
    /// and its answer cannot be trusted.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Committed height this view was taken at.
    fn committed_height(&self) -> Result<BlockHeight, StorageError>;
}

/// Buffered writes for one block.
///
/// Nothing staged here is visible to any reader until the scope is passed to
/// [`KvStore::commit`]. Dropping a scope discards everything it staged.
pub trait WriteScope: Send {
    /// Stage `key = value`, replacing any earlier staged value for `key`.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Number of set operations staged so far.
    fn staged_count(&self) -> usize;

    /// Total key + value bytes staged so far.
    fn staged_bytes(&self) -> usize;
}

/// A transactional, ordered, byte-keyed store.
///
/// All methods take `&self`; implementations use interior mutability so a
/// store can be shared between the block lifecycle and concurrent queries.
///
/// Implementations serialize commits internally. Opening several write scopes
/// is allowed by the store; keeping to one open scope at a time is the
/// caller's protocol.
pub trait KvStore: Send + Sync {
    /// The snapshot type returned by this storage.
    type Snapshot<'a>: ReadView + Send + Sync
    where
        Self: 'a;

    /// The write scope type returned by this storage.
    ///
    /// Owns its buffer so it can be held across callbacks without borrowing
    /// the store.
    type WriteScope: WriteScope + 'static;

    /// Create a snapshot for isolated reads.
    ///
    /// Snapshots provide a consistent point-in-time view of committed state,
    /// immune to commits that happen after they are taken.
    fn snapshot(&self) -> Self::Snapshot<'_>;

    /// Open an empty write scope.
    fn begin_write(&self) -> Self::WriteScope;

    /// Atomically apply a write scope and advance the committed height by one.
    ///
    /// Either every staged write and the new height become visible together,
    /// or nothing does.
    fn commit(&self, scope: Self::WriteScope) -> Result<CommitResult, StorageError>;

    /// Current committed height.
    ///
    /// Height 0 means no commits have occurred.
    fn committed_height(&self) -> Result<BlockHeight, StorageError>;
}

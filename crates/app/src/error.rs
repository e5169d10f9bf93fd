//! Application error types.
//!
//! Rejected transactions are not errors: they are result codes inside a
//! response. Everything that reaches [`AppError`] is fatal.

use kvstore_storage::StorageError;
use std::fmt;
use thiserror::Error;

/// A callback arrived out of protocol order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// `begin_block` while a block is still open.
    #[error("begin_block at height {attempted} while block at height {open} is still open")]
    BlockAlreadyOpen {
        /// Height of the block that is still open.
        open: u64,
        /// Height the driver tried to begin.
        attempted: u64,
    },

    /// A block-scoped callback with no open block.
    #[error("{callback} called with no open block")]
    NoOpenBlock {
        /// The offending callback.
        callback: &'static str,
    },
}

/// The storage operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    /// Staging a write into the open block.
    Stage,
    /// Committing the open block.
    Commit,
    /// Reading committed state.
    Read,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageOp::Stage => "stage",
            StorageOp::Commit => "commit",
            StorageOp::Read => "read",
        })
    }
}

/// An unrecoverable fault. The process must stop.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The driver broke the callback ordering.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// The durable store failed.
    #[error("storage {op} failed: {source}")]
    Storage {
        /// Which operation failed.
        op: StorageOp,
        /// The underlying storage error.
        #[source]
        source: StorageError,
    },
}

impl FatalError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FatalError::Protocol(_) => "protocol",
            FatalError::Storage { .. } => "storage",
        }
    }
}

/// Error returned by application callbacks.
#[derive(Debug, Error)]
pub enum AppError {
    /// Fail-stop: the caller must terminate the process.
    #[error("fatal: {0}")]
    Fatal(#[from] FatalError),
}

impl AppError {
    /// Every application error is fatal; this exists so callers can say so.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Fatal(_))
    }

    /// The underlying fatal fault.
    pub fn fatal(&self) -> &FatalError {
        match self {
            AppError::Fatal(fatal) => fatal,
        }
    }

    pub(crate) fn storage(op: StorageOp, source: StorageError) -> Self {
        AppError::Fatal(FatalError::Storage { op, source })
    }
}

impl From<ProtocolViolation> for AppError {
    fn from(violation: ProtocolViolation) -> Self {
        AppError::Fatal(FatalError::Protocol(violation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = AppError::storage(
            StorageOp::Commit,
            StorageError::DatabaseError("disk gone".into()),
        );
        assert!(err.is_fatal());
        assert_eq!(err.fatal().kind(), "storage");
        assert_eq!(
            err.to_string(),
            "fatal: storage commit failed: Database error: disk gone"
        );

        let err = AppError::from(ProtocolViolation::NoOpenBlock {
            callback: "deliver_tx",
        });
        assert_eq!(err.fatal().kind(), "protocol");
        assert_eq!(
            err.to_string(),
            "fatal: protocol violation: deliver_tx called with no open block"
        );
    }
}

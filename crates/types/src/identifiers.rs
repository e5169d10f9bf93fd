//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Height of a committed block.
///
/// Height 0 means nothing has been committed yet. Each successful block
/// commit advances the height by exactly one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    /// The height before any block has been committed.
    pub const GENESIS: BlockHeight = BlockHeight(0);

    /// The height that the next commit will produce.
    pub fn next(self) -> BlockHeight {
        BlockHeight(self.0 + 1)
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlockHeight {
    fn from(height: u64) -> Self {
        BlockHeight(height)
    }
}

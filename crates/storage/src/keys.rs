//! Metadata keys and encodings shared by storage implementations.

use crate::StorageError;
use kvstore_types::BlockHeight;

/// Metadata key holding the committed height.
///
/// Backends keep it out of the user key space (RocksDB: a separate column
/// family), so no transaction can overwrite it.
pub const COMMITTED_HEIGHT_KEY: &[u8] = b"meta:committed_height";

/// Encode a height as 8 big-endian bytes.
pub fn encode_height(height: BlockHeight) -> [u8; 8] {
    height.0.to_be_bytes()
}

/// Decode a stored height. A missing value is height 0.
pub fn decode_height(bytes: Option<&[u8]>) -> Result<BlockHeight, StorageError> {
    let Some(bytes) = bytes else {
        return Ok(BlockHeight::GENESIS);
    };
    let raw = <[u8; 8]>::try_from(bytes).map_err(|_| StorageError::Corruption {
        key: String::from_utf8_lossy(COMMITTED_HEIGHT_KEY).into_owned(),
        reason: format!("expected 8 bytes, found {}", bytes.len()),
    })?;
    Ok(BlockHeight(u64::from_be_bytes(raw)))
}

/// Bytes a single staged write accounts for against a write scope limit.
pub fn write_size(key: &[u8], value: &[u8]) -> usize {
    key.len() + value.len()
}

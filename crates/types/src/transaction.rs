//! Raw key/value transactions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Byte sequence separating the key from the value inside a transaction.
pub const SEPARATOR: &[u8] = b"=";

/// An opaque transaction payload of the form `<key> "=" <value>`.
///
/// The bytes are kept exactly as submitted; format rules are applied by
/// [`Transaction::split`]. Serializes as a hex string.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transaction(#[serde(with = "crate::serde_hex")] Vec<u8>);

/// Why a transaction does not have the `key=value` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The separator does not occur at all (a single segment).
    #[error("malformed transaction: no '=' separator")]
    MissingSeparator,

    /// The separator occurs more than once (three or more segments).
    #[error("malformed transaction: {count} '=' separators, expected exactly one")]
    MultipleSeparators {
        /// Number of separator occurrences found.
        count: usize,
    },
}

/// Key and value borrowed from a well-formed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxKeyValue<'a> {
    /// Everything before the separator. May be empty.
    pub key: &'a [u8],
    /// Everything after the separator. May be empty.
    pub value: &'a [u8],
}

impl Transaction {
    /// Wrap raw transaction bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw bytes of the transaction.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments the payload splits into on [`SEPARATOR`].
    ///
    /// Occurrences are matched left to right without overlap, so this is
    /// always `separator occurrences + 1`.
    pub fn segment_count(&self) -> usize {
        separator_positions(&self.0).count() + 1
    }

    /// Split into key and value.
    ///
    /// Succeeds only when the separator occurs exactly once. A value that
    /// itself contains the separator is rejected rather than truncated, so
    /// every replica reaches the same verdict regardless of split strategy.
    pub fn split(&self) -> Result<TxKeyValue<'_>, FormatError> {
        let mut positions = separator_positions(&self.0);
        let first = positions.next().ok_or(FormatError::MissingSeparator)?;
        let extra = positions.count();
        if extra > 0 {
            return Err(FormatError::MultipleSeparators { count: extra + 1 });
        }
        Ok(TxKeyValue {
            key: &self.0[..first],
            value: &self.0[first + SEPARATOR.len()..],
        })
    }
}

/// Start offsets of non-overlapping separator occurrences.
fn separator_positions(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    let mut offset = 0;
    std::iter::from_fn(move || {
        let rest = bytes.get(offset..)?;
        let found = rest
            .windows(SEPARATOR.len())
            .position(|window| window == SEPARATOR)?;
        let position = offset + found;
        offset = position + SEPARATOR.len();
        Some(position)
    })
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transaction({})", String::from_utf8_lossy(&self.0))
    }
}

impl From<Vec<u8>> for Transaction {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Transaction {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Transaction {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for Transaction {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_well_formed() {
        let tx = Transaction::from("alice=100");
        let kv = tx.split().unwrap();
        assert_eq!(kv.key, b"alice");
        assert_eq!(kv.value, b"100");
        assert_eq!(tx.segment_count(), 2);
    }

    #[test]
    fn test_split_missing_separator() {
        assert_eq!(
            Transaction::from("bob100").split(),
            Err(FormatError::MissingSeparator)
        );
        assert_eq!(Transaction::from("").split(), Err(FormatError::MissingSeparator));
        assert_eq!(Transaction::from("").segment_count(), 1);
    }

    #[test]
    fn test_split_rejects_separator_in_value() {
        let tx = Transaction::from("a=b=c");
        assert_eq!(tx.segment_count(), 3);
        assert_eq!(
            tx.split(),
            Err(FormatError::MultipleSeparators { count: 2 })
        );
        assert_eq!(
            Transaction::from("==").split(),
            Err(FormatError::MultipleSeparators { count: 2 })
        );
    }

    #[test]
    fn test_split_allows_empty_segments() {
        let empty_key = Transaction::from("=v");
        assert_eq!(empty_key.split().unwrap().key, b"");
        assert_eq!(empty_key.split().unwrap().value, b"v");

        let empty_value = Transaction::from("k=");
        assert_eq!(empty_value.split().unwrap().value, b"");

        let both = Transaction::from("=");
        assert_eq!(
            both.split().unwrap(),
            TxKeyValue {
                key: b"",
                value: b""
            }
        );
    }

    #[test]
    fn test_split_binary_payload() {
        let tx = Transaction::new(vec![0xff, 0x00, b'=', 0x80]);
        let kv = tx.split().unwrap();
        assert_eq!(kv.key, &[0xff, 0x00]);
        assert_eq!(kv.value, &[0x80]);
    }

    #[test]
    fn test_serializes_as_hex() {
        let tx = Transaction::from("k=v");
        let json = serde_json::to_string(&tx).unwrap();
        assert_eq!(json, "\"6b3d76\"");
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_rejects_invalid_hex() {
        assert!(serde_json::from_str::<Transaction>("\"zz\"").is_err());
    }
}

//! Stateless transaction format check.
//!
//! The same verdict function serves admission (`check_tx`) and block-time
//! application (`deliver_tx`). It looks at nothing but the transaction bytes.

use kvstore_types::{FormatError, Transaction, TxKeyValue, CODE_INVALID_FORMAT, CODE_OK};

/// Log attached to every rejected transaction.
pub const REJECT_LOG: &str = "malformed transaction: expected exactly one '='";

/// Outcome of checking one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict<'a> {
    /// Exactly one separator: the key/value pair to write.
    Accept(TxKeyValue<'a>),
    /// Any other segment count.
    Reject(FormatError),
}

impl Verdict<'_> {
    /// Result code: [`CODE_OK`] or [`CODE_INVALID_FORMAT`].
    pub fn code(&self) -> u32 {
        match self {
            Verdict::Accept(_) => CODE_OK,
            Verdict::Reject(_) => CODE_INVALID_FORMAT,
        }
    }

    /// Response log: empty on accept.
    pub fn log(&self) -> &'static str {
        match self {
            Verdict::Accept(_) => "",
            Verdict::Reject(_) => REJECT_LOG,
        }
    }

    /// Whether the transaction is well-formed.
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept(_))
    }
}

/// Check a transaction's format.
pub fn validate(tx: &Transaction) -> Verdict<'_> {
    match tx.split() {
        Ok(kv) => Verdict::Accept(kv),
        Err(reason) => Verdict::Reject(reason),
    }
}

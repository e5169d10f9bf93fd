//! Storage traits and shared types.
//!
//! This crate defines the storage abstraction the application state machine
//! persists its key/value ledger through, along with the metadata encoding
//! that both in-memory and RocksDB storage implementations share.
//!
//! # Design
//!
//! The state machine never talks to a concrete database. It sees three
//! capabilities:
//!
//! - [`KvStore::snapshot`] - an isolated, point-in-time [`ReadView`] of
//!   committed state, used by queries
//! - [`KvStore::begin_write`] - a fresh [`WriteScope`] that buffers the
//!   writes of one block and is invisible to every reader
//! - [`KvStore::commit`] - applies a scope's buffered writes and advances
//!   the committed height in one atomic step
//!
//! Backends:
//! - `MemStorage` (in-memory, `im::OrdMap`) for tests and single-process runs
//! - `RocksDbStorage` for production
//!
//! # Isolation
//!
//! A snapshot taken before a commit never observes that commit, and a write
//! scope is never readable through any snapshot. Together these give the
//! query path its only concurrency guarantee: reads always see whole blocks.

#![warn(missing_docs)]

mod commit;
pub mod keys;
mod store;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use commit::CommitResult;
pub use store::{KvStore, ReadView, StorageError, WriteScope};

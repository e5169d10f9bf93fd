//! # In-Memory Storage
//!
//! In-memory [`kvstore_storage::KvStore`] implementation for tests and
//! single-process runs.
//!
//! Uses `im::OrdMap` for O(1) structural-sharing clones, enabling efficient
//! snapshots without copying the entire dataset. Queries take a snapshot and
//! read from it while the block lifecycle keeps committing.

mod storage;

pub use storage::{MemSnapshot, MemStorage, MemWriteScope};

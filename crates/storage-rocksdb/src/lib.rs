//! # RocksDB Storage
//!
//! Production [`kvstore_storage::KvStore`] backed by RocksDB: native
//! snapshots for queries, one `WriteBatch` per block, and the committed height
//! persisted atomically with each block's writes.

mod storage;

pub use storage::{
    CompressionType, RocksDbConfig, RocksDbSnapshot, RocksDbStorage, RocksDbWriteScope,
};

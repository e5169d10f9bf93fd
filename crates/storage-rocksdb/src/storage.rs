//! # RocksDB Storage
//!
//! Production storage implementation using RocksDB.
//!
//! All operations are synchronous blocking I/O. Callers in async contexts
//! should use `spawn_blocking` if needed to avoid blocking the runtime.
//!
//! User keys live in the `state` column family. The committed height lives in
//! `meta` and is written in the same `WriteBatch` as the block's state, so a
//! crash either persists both or neither.

use kvstore_metrics as metrics;
use kvstore_storage::{keys, CommitResult, KvStore, ReadView, StorageError, WriteScope};
use kvstore_types::BlockHeight;
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Options, Snapshot, WriteBatch, WriteOptions, DB,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, Level};

/// Column family holding user keys.
const STATE_CF: &str = "state";

/// Column family holding store metadata (committed height).
const META_CF: &str = "meta";

const COLUMN_FAMILIES: [&str; 3] = ["default", STATE_CF, META_CF];

fn db_err(e: rocksdb::Error) -> StorageError {
    StorageError::DatabaseError(e.to_string())
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily, StorageError> {
    db.cf_handle(name)
        .ok_or_else(|| StorageError::DatabaseError(format!("{name} column family must exist")))
}

/// RocksDB-based storage for production use.
///
/// Features:
/// - Column families for logical separation
/// - LZ4 compression for disk efficiency
/// - Block cache for read performance
/// - Bloom filters for key existence checks
/// - Native snapshots for isolated queries
pub struct RocksDbStorage {
    db: Arc<DB>,

    /// Serializes commits so the read-modify-write of the committed height
    /// cannot interleave.
    commit_lock: Mutex<()>,

    /// Whether each commit waits for the WAL to reach disk.
    sync_writes: bool,

    /// Upper bound on key + value bytes one write scope may stage.
    max_write_scope_bytes: Option<usize>,
}

impl RocksDbStorage {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Creates column families: default, state, meta.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: RocksDbConfig,
    ) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // Performance tuning
        opts.set_max_background_jobs(config.max_background_jobs);
        if config.bytes_per_sync > 0 {
            opts.set_bytes_per_sync(config.bytes_per_sync as u64);
        }
        opts.set_keep_log_file_num(config.keep_log_file_num);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_write_buffer_size(config.write_buffer_size);

        // Compression
        opts.set_compression_type(config.compression.to_rocksdb());

        // Block cache and bloom filter
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        if let Some(cache_size) = config.block_cache_size {
            let cache = rocksdb::Cache::new_lru_cache(cache_size);
            block_opts.set_block_cache(&cache);
        }
        if config.bloom_filter_bits > 0.0 {
            block_opts.set_bloom_filter(config.bloom_filter_bits, false);
        }
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<_> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(config.compression.to_rocksdb());
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let path = path.as_ref();
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors).map_err(db_err)?;

        let storage = Self {
            db: Arc::new(db),
            commit_lock: Mutex::new(()),
            sync_writes: config.sync_writes,
            max_write_scope_bytes: config.max_write_scope_bytes,
        };

        let height = storage.committed_height()?;
        info!(path = %path.display(), %height, "opened RocksDB storage");
        Ok(storage)
    }

    fn read_committed_height(&self) -> Result<BlockHeight, StorageError> {
        let meta = cf(&self.db, META_CF)?;
        let raw = self
            .db
            .get_cf(meta, keys::COMMITTED_HEIGHT_KEY)
            .map_err(db_err)?;
        keys::decode_height(raw.as_deref())
    }
}

impl KvStore for RocksDbStorage {
    type Snapshot<'a> = RocksDbSnapshot<'a>;
    type WriteScope = RocksDbWriteScope;

    fn snapshot(&self) -> Self::Snapshot<'_> {
        // Use RocksDB's native snapshot feature for point-in-time isolation.
        // The snapshot provides a consistent view of the database at the time
        // of creation, immune to concurrent writes.
        RocksDbSnapshot {
            snapshot: self.db.snapshot(),
            db: &self.db,
        }
    }

    fn begin_write(&self) -> Self::WriteScope {
        RocksDbWriteScope {
            db: Arc::clone(&self.db),
            batch: WriteBatch::default(),
            staged_count: 0,
            staged_bytes: 0,
            limit: self.max_write_scope_bytes,
        }
    }

    #[instrument(level = Level::DEBUG, skip_all, fields(
        writes = scope.staged_count,
        height = tracing::field::Empty,
        latency_us = tracing::field::Empty,
    ))]
    fn commit(&self, scope: Self::WriteScope) -> Result<CommitResult, StorageError> {
        if !Arc::ptr_eq(&self.db, &scope.db) {
            return Err(StorageError::DatabaseError(
                "write scope belongs to a different database".to_string(),
            ));
        }

        let start = Instant::now();
        let _commit_guard = self.commit_lock.lock();

        let RocksDbWriteScope {
            mut batch,
            staged_count,
            ..
        } = scope;

        let height = self.read_committed_height()?.next();
        let meta = cf(&self.db, META_CF)?;
        batch.put_cf(meta, keys::COMMITTED_HEIGHT_KEY, keys::encode_height(height));
        let batch_len = batch.len();

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &write_opts).map_err(db_err)?;

        let elapsed = start.elapsed();
        metrics::record_storage_write(elapsed.as_secs_f64());
        metrics::record_storage_batch_size(batch_len);

        let span = tracing::Span::current();
        span.record("height", height.0);
        span.record("latency_us", elapsed.as_micros() as u64);
        debug!(%height, writes = staged_count, "committed write batch");

        Ok(CommitResult {
            height,
            writes: staged_count,
        })
    }

    fn committed_height(&self) -> Result<BlockHeight, StorageError> {
        self.read_committed_height()
    }
}

/// Snapshot of RocksDB storage.
///
/// Uses RocksDB's native snapshot feature to provide point-in-time isolation.
/// Any writes that occur after the snapshot is created are invisible to reads
/// through this snapshot.
pub struct RocksDbSnapshot<'a> {
    snapshot: Snapshot<'a>,
    db: &'a DB,
}

impl ReadView for RocksDbSnapshot<'_> {
    #[instrument(level = Level::DEBUG, skip_all, fields(
        found = tracing::field::Empty,
        latency_us = tracing::field::Empty,
    ))]
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let start = Instant::now();
        let state = cf(self.db, STATE_CF)?;
        let result = self.snapshot.get_cf(state, key).map_err(db_err)?;
        let elapsed = start.elapsed();
        metrics::record_storage_read(elapsed.as_secs_f64());

        // Record span fields
        let span = tracing::Span::current();
        span.record("found", result.is_some());
        span.record("latency_us", elapsed.as_micros() as u64);

        Ok(result)
    }

    fn committed_height(&self) -> Result<BlockHeight, StorageError> {
        let meta = cf(self.db, META_CF)?;
        let raw = self
            .snapshot
            .get_cf(meta, keys::COMMITTED_HEIGHT_KEY)
            .map_err(db_err)?;
        keys::decode_height(raw.as_deref())
    }
}

/// Buffered writes for one block, staged in a `WriteBatch`.
///
/// Holds its own handle to the database so it can outlive any borrow of the
/// store. Nothing reaches RocksDB until [`KvStore::commit`].
pub struct RocksDbWriteScope {
    db: Arc<DB>,
    batch: WriteBatch,
    staged_count: usize,
    staged_bytes: usize,
    limit: Option<usize>,
}

impl WriteScope for RocksDbWriteScope {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let attempted = self.staged_bytes + keys::write_size(key, value);
        if let Some(limit) = self.limit {
            if attempted > limit {
                return Err(StorageError::WriteScopeFull { limit, attempted });
            }
        }
        let state = cf(&self.db, STATE_CF)?;
        self.batch.put_cf(state, key, value);
        self.staged_count += 1;
        self.staged_bytes = attempted;
        Ok(())
    }

    fn staged_count(&self) -> usize {
        self.staged_count
    }

    fn staged_bytes(&self) -> usize {
        self.staged_bytes
    }
}

/// Compression type for RocksDB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    Snappy,
    Zlib,
    #[default]
    Lz4,
    Lz4hc,
    Zstd,
}

impl CompressionType {
    fn to_rocksdb(self) -> rocksdb::DBCompressionType {
        match self {
            CompressionType::None => rocksdb::DBCompressionType::None,
            CompressionType::Snappy => rocksdb::DBCompressionType::Snappy,
            CompressionType::Zlib => rocksdb::DBCompressionType::Zlib,
            CompressionType::Lz4 => rocksdb::DBCompressionType::Lz4,
            CompressionType::Lz4hc => rocksdb::DBCompressionType::Lz4hc,
            CompressionType::Zstd => rocksdb::DBCompressionType::Zstd,
        }
    }
}

/// Configuration for RocksDB storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RocksDbConfig {
    /// Maximum number of background jobs
    pub max_background_jobs: i32,
    /// Write buffer size in bytes
    pub write_buffer_size: usize,
    /// Maximum number of write buffers
    pub max_write_buffer_number: i32,
    /// Block cache size in bytes (None to disable)
    pub block_cache_size: Option<usize>,
    /// Compression type
    pub compression: CompressionType,
    /// Bloom filter bits per key (0 to disable)
    pub bloom_filter_bits: f64,
    /// Bytes per sync (0 to disable)
    pub bytes_per_sync: usize,
    /// Number of log files to keep
    pub keep_log_file_num: usize,
    /// Fsync the WAL on every commit.
    ///
    /// A commit acknowledged with this off can be lost on power failure,
    /// though never partially applied.
    pub sync_writes: bool,
    /// Maximum key + value bytes a single block may stage (None for no limit).
    ///
    /// Exceeding it fails the offending `set`, which the application treats
    /// as a storage fault.
    pub max_write_scope_bytes: Option<usize>,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_background_jobs: 4,
            write_buffer_size: 128 * 1024 * 1024, // 128MB
            max_write_buffer_number: 3,
            block_cache_size: Some(512 * 1024 * 1024), // 512MB
            compression: CompressionType::Lz4,
            bloom_filter_bits: 10.0,
            bytes_per_sync: 1024 * 1024, // 1MB
            keep_log_file_num: 10,
            sync_writes: true,
            max_write_scope_bytes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvstore_storage::test_helpers::{self, commit_pairs, read};
    use tempfile::TempDir;

    fn small_config() -> RocksDbConfig {
        RocksDbConfig {
            write_buffer_size: 4 * 1024 * 1024,
            block_cache_size: Some(8 * 1024 * 1024),
            ..RocksDbConfig::default()
        }
    }

    fn open(temp_dir: &TempDir) -> RocksDbStorage {
        RocksDbStorage::open_with_config(temp_dir.path(), small_config()).unwrap()
    }

    #[test]
    fn test_read_your_writes() {
        let temp_dir = TempDir::new().unwrap();
        test_helpers::check_read_your_writes(&open(&temp_dir));
    }

    #[test]
    fn test_snapshot_isolation() {
        let temp_dir = TempDir::new().unwrap();
        test_helpers::check_snapshot_isolation(&open(&temp_dir));
    }

    #[test]
    fn test_uncommitted_scope_invisible() {
        let temp_dir = TempDir::new().unwrap();
        test_helpers::check_uncommitted_scope_invisible(&open(&temp_dir));
    }

    #[test]
    fn test_dropped_scope_discarded() {
        let temp_dir = TempDir::new().unwrap();
        test_helpers::check_dropped_scope_discarded(&open(&temp_dir));
    }

    #[test]
    fn test_last_write_wins() {
        let temp_dir = TempDir::new().unwrap();
        test_helpers::check_last_write_wins(&open(&temp_dir));
    }

    #[test]
    fn test_height_advances() {
        let temp_dir = TempDir::new().unwrap();
        test_helpers::check_height_advances(&open(&temp_dir));
    }

    #[test]
    fn test_empty_key_and_value() {
        let temp_dir = TempDir::new().unwrap();
        test_helpers::check_empty_key_and_value(&open(&temp_dir));
    }

    #[test]
    fn test_persistence_across_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let storage = open(&temp_dir);
            commit_pairs(&storage, &[(b"alice", b"100")]);
            commit_pairs(&storage, &[(b"bob", b"7")]);
        }

        let storage = open(&temp_dir);
        assert_eq!(storage.committed_height().unwrap(), BlockHeight(2));
        assert_eq!(read(&storage, b"alice"), Some(b"100".to_vec()));
        assert_eq!(read(&storage, b"bob"), Some(b"7".to_vec()));
    }

    #[test]
    fn test_crash_before_commit_loses_whole_block() {
        let temp_dir = TempDir::new().unwrap();

        {
            let storage = open(&temp_dir);
            commit_pairs(&storage, &[(b"k", b"committed")]);

            let mut scope = storage.begin_write();
            scope.set(b"k", b"pending").unwrap();
            scope.set(b"other", b"pending").unwrap();
            // Process dies here: scope and storage dropped without commit
            drop(scope);
        }

        let storage = open(&temp_dir);
        assert_eq!(storage.committed_height().unwrap(), BlockHeight(1));
        assert_eq!(read(&storage, b"k"), Some(b"committed".to_vec()));
        assert_eq!(read(&storage, b"other"), None);
    }

    #[test]
    fn test_height_key_not_in_user_space() {
        let temp_dir = TempDir::new().unwrap();
        let storage = open(&temp_dir);
        commit_pairs(&storage, &[(keys::COMMITTED_HEIGHT_KEY, b"not a height")]);
        commit_pairs(&storage, &[]);

        assert_eq!(storage.committed_height().unwrap(), BlockHeight(2));
        assert_eq!(
            read(&storage, keys::COMMITTED_HEIGHT_KEY),
            Some(b"not a height".to_vec())
        );
    }

    #[test]
    fn test_write_limit() {
        let temp_dir = TempDir::new().unwrap();
        let config = RocksDbConfig {
            max_write_scope_bytes: Some(8),
            ..small_config()
        };
        let storage = RocksDbStorage::open_with_config(temp_dir.path(), config).unwrap();

        let mut scope = storage.begin_write();
        scope.set(b"ab", b"cd").unwrap();
        let err = scope.set(b"efg", b"hij").unwrap_err();
        assert!(matches!(err, StorageError::WriteScopeFull { limit: 8, .. }));
        assert_eq!(scope.staged_count(), 1);
    }

    #[test]
    fn test_scope_from_other_database_rejected() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let a = open(&dir_a);
        let b = open(&dir_b);

        let mut scope = a.begin_write();
        scope.set(b"k", b"v").unwrap();
        assert!(b.commit(scope).is_err());
        assert_eq!(b.committed_height().unwrap(), BlockHeight::GENESIS);
    }

    #[test]
    fn test_unsynced_writes_still_visible() {
        let temp_dir = TempDir::new().unwrap();
        let config = RocksDbConfig {
            sync_writes: false,
            ..small_config()
        };
        let storage = RocksDbStorage::open_with_config(temp_dir.path(), config).unwrap();
        commit_pairs(&storage, &[(b"k", b"v")]);
        assert_eq!(read(&storage, b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn test_config_from_toml() {
        let config: RocksDbConfig = toml::from_str(
            r#"
            compression = "zstd"
            sync_writes = false
            max_write_scope_bytes = 1048576
            "#,
        )
        .unwrap();
        assert_eq!(config.compression, CompressionType::Zstd);
        assert!(!config.sync_writes);
        assert_eq!(config.max_write_scope_bytes, Some(1_048_576));
        assert_eq!(config.max_background_jobs, 4);
    }
}

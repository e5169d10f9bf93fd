//! # In-Memory Storage
//!
//! Uses `im::OrdMap` for O(1) structural-sharing clones, so a snapshot costs
//! a reference-count bump no matter how large the ledger grows.

use im::OrdMap;
use kvstore_storage::{keys, CommitResult, KvStore, ReadView, StorageError, WriteScope};
use kvstore_types::BlockHeight;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, instrument, Level};

/// Committed state: the ledger plus the height it was committed at.
///
/// Cloning is O(1); the map shares structure with every other clone.
#[derive(Clone, Default)]
struct Committed {
    data: OrdMap<Vec<u8>, Vec<u8>>,
    height: BlockHeight,
}

/// In-memory storage for tests and single-process runs.
///
/// Uses `im::OrdMap` which provides:
/// - Deterministic ordering (like BTreeMap)
/// - O(1) clone via structural sharing
///
/// Ledger and height live behind one lock, so a commit swaps both in a single
/// critical section and no reader ever sees one without the other.
pub struct MemStorage {
    committed: RwLock<Committed>,

    /// Upper bound on key + value bytes one write scope may stage.
    max_write_scope_bytes: Option<usize>,
}

impl MemStorage {
    /// Create a new empty storage.
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(Committed::default()),
            max_write_scope_bytes: None,
        }
    }

    /// Create a storage whose write scopes refuse to stage more than
    /// `limit` bytes.
    pub fn with_write_limit(limit: usize) -> Self {
        Self {
            committed: RwLock::new(Committed::default()),
            max_write_scope_bytes: Some(limit),
        }
    }

    /// Get number of committed keys.
    pub fn len(&self) -> usize {
        self.committed.read().data.len()
    }

    /// Check if no keys are committed.
    pub fn is_empty(&self) -> bool {
        self.committed.read().data.is_empty()
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemStorage {
    type Snapshot<'a> = MemSnapshot;
    type WriteScope = MemWriteScope;

    fn snapshot(&self) -> Self::Snapshot<'_> {
        // O(1) clone with structural sharing
        MemSnapshot {
            committed: self.committed.read().clone(),
        }
    }

    fn begin_write(&self) -> Self::WriteScope {
        MemWriteScope {
            writes: BTreeMap::new(),
            staged_count: 0,
            staged_bytes: 0,
            limit: self.max_write_scope_bytes,
        }
    }

    #[instrument(level = Level::DEBUG, skip_all, fields(
        writes = scope.staged_count,
        height = tracing::field::Empty,
    ))]
    fn commit(&self, scope: Self::WriteScope) -> Result<CommitResult, StorageError> {
        let start = Instant::now();
        let writes = scope.staged_count;
        let batch_len = scope.writes.len();

        let height = {
            let mut committed = self.committed.write();
            for (key, value) in scope.writes {
                committed.data.insert(key, value);
            }
            committed.height = committed.height.next();
            committed.height
        };

        tracing::Span::current().record("height", height.0);
        kvstore_metrics::record_storage_write(start.elapsed().as_secs_f64());
        kvstore_metrics::record_storage_batch_size(batch_len);
        debug!(%height, writes, "committed write scope");

        Ok(CommitResult { height, writes })
    }

    fn committed_height(&self) -> Result<BlockHeight, StorageError> {
        Ok(self.committed.read().height)
    }
}

/// Snapshot of in-memory storage.
///
/// Contains a structurally-shared copy of the data at snapshot time.
pub struct MemSnapshot {
    committed: Committed,
}

impl ReadView for MemSnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let start = Instant::now();
        let value = self.committed.data.get(key).cloned();
        kvstore_metrics::record_storage_read(start.elapsed().as_secs_f64());
        Ok(value)
    }

    fn committed_height(&self) -> Result<BlockHeight, StorageError> {
        Ok(self.committed.height)
    }
}

/// Buffered writes for one block.
///
/// Duplicate keys collapse in the buffer (last write wins) while
/// `staged_count` keeps counting every `set`.
pub struct MemWriteScope {
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
    staged_count: usize,
    staged_bytes: usize,
    limit: Option<usize>,
}

impl WriteScope for MemWriteScope {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let attempted = self.staged_bytes + keys::write_size(key, value);
        if let Some(limit) = self.limit {
            if attempted > limit {
                return Err(StorageError::WriteScopeFull { limit, attempted });
            }
        }
        self.writes.insert(key.to_vec(), value.to_vec());
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

#[cfg(test)]
mod tests {
    use super::*;
    use kvstore_storage::test_helpers;

    #[test]
    fn test_read_your_writes() {
        test_helpers::check_read_your_writes(&MemStorage::new());
    }

    #[test]
    fn test_snapshot_isolation() {
        test_helpers::check_snapshot_isolation(&MemStorage::new());
    }

    #[test]
    fn test_uncommitted_scope_invisible() {
        test_helpers::check_uncommitted_scope_invisible(&MemStorage::new());
    }

    #[test]
    fn test_dropped_scope_discarded() {
        test_helpers::check_dropped_scope_discarded(&MemStorage::new());
    }

    #[test]
    fn test_last_write_wins() {
        test_helpers::check_last_write_wins(&MemStorage::new());
    }

    #[test]
    fn test_height_advances() {
        test_helpers::check_height_advances(&MemStorage::new());
    }

    #[test]
    fn test_empty_key_and_value() {
        test_helpers::check_empty_key_and_value(&MemStorage::new());
    }

    #[test]
    fn test_write_limit() {
        let storage = MemStorage::with_write_limit(8);
        let mut scope = storage.begin_write();
        scope.set(b"ab", b"cd").unwrap();
        let err = scope.set(b"efg", b"hij").unwrap_err();
        assert!(matches!(
            err,
            StorageError::WriteScopeFull {
                limit: 8,
                attempted: 10
            }
        ));

        // The rejected write was not staged
        assert_eq!(scope.staged_count(), 1);
        assert_eq!(scope.staged_bytes(), 4);
        storage.commit(scope).unwrap();
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_staged_count_includes_overwrites() {
        let storage = MemStorage::new();
        let mut scope = storage.begin_write();
        scope.set(b"k", b"1").unwrap();
        scope.set(b"k", b"2").unwrap();
        assert_eq!(scope.staged_count(), 2);
        let result = storage.commit(scope).unwrap();
        assert_eq!(result.writes, 2);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_snapshot_structural_sharing_performance() {
        let storage = MemStorage::new();

        // Insert 10,000 items
        let mut scope = storage.begin_write();
        for i in 0..10_000u32 {
            scope.set(&i.to_be_bytes(), &[i as u8]).unwrap();
        }
        storage.commit(scope).unwrap();

        // Snapshot should be nearly instant (O(1), not O(n))
        let start = Instant::now();
        let _snap1 = storage.snapshot();
        let _snap2 = storage.snapshot();
        let _snap3 = storage.snapshot();
        let _snap4 = storage.snapshot();
        let _snap5 = storage.snapshot();
        let elapsed = start.elapsed();

        assert!(
            elapsed.as_millis() < 50,
            "5 snapshots took {:?}, expected < 50ms",
            elapsed
        );
    }

    #[test]
    fn test_concurrent_snapshots_see_whole_blocks() {
        use std::sync::Arc;

        let storage = Arc::new(MemStorage::new());
        let reader = {
            let storage = Arc::clone(&storage);
            std::thread::spawn(move || {
                for _ in 0..1_000 {
                    let snapshot = storage.snapshot();
                    let a = snapshot.get(b"a").unwrap();
                    let b = snapshot.get(b"b").unwrap();
                    // Both keys are always written in the same block
                    assert_eq!(a, b);
                }
            })
        };

        for i in 0..200u32 {
            let mut scope = storage.begin_write();
            scope.set(b"a", &i.to_be_bytes()).unwrap();
            scope.set(b"b", &i.to_be_bytes()).unwrap();
            storage.commit(scope).unwrap();
        }
        reader.join().unwrap();
        assert_eq!(storage.committed_height().unwrap(), BlockHeight(200));
    }
}

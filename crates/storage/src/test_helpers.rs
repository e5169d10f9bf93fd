//! Shared test helpers for storage crate tests.
//!
//! Provides a conformance suite that every [`KvStore`] backend runs against a
//! fresh store, so that storage-memory and storage-rocksdb tests share a
//! single source of truth, plus a fault-injecting wrapper the application
//! tests use to drive the fatal paths.

use crate::{CommitResult, KvStore, ReadView, StorageError, WriteScope};
use kvstore_types::BlockHeight;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stage `pairs` in a fresh scope and commit it.
pub fn commit_pairs<S: KvStore>(store: &S, pairs: &[(&[u8], &[u8])]) -> CommitResult {
    let mut scope = store.begin_write();
    for (key, value) in pairs {
        scope.set(key, value).unwrap();
    }
    store.commit(scope).unwrap()
}

/// Read `key` through a fresh snapshot.
pub fn read<S: KvStore>(store: &S, key: &[u8]) -> Option<Vec<u8>> {
    store.snapshot().get(key).unwrap()
}

/// Committed writes are visible to later snapshots.
pub fn check_read_your_writes<S: KvStore>(store: &S) {
    assert_eq!(read(store, b"alice"), None);

    let result = commit_pairs(store, &[(b"alice", b"100"), (b"bob", b"7")]);
    assert_eq!(result.height, BlockHeight(1));
    assert_eq!(result.writes, 2);

    assert_eq!(read(store, b"alice"), Some(b"100".to_vec()));
    assert_eq!(read(store, b"bob"), Some(b"7".to_vec()));
    assert_eq!(read(store, b"carol"), None);
}

/// A snapshot keeps serving the state it was taken at.
pub fn check_snapshot_isolation<S: KvStore>(store: &S) {
    commit_pairs(store, &[(b"k", b"1")]);

    let snapshot = store.snapshot();
    commit_pairs(store, &[(b"k", b"2"), (b"new", b"x")]);

    // Snapshot has old value
    assert_eq!(snapshot.get(b"k").unwrap(), Some(b"1".to_vec()));
    assert_eq!(snapshot.get(b"new").unwrap(), None);
    assert_eq!(snapshot.committed_height().unwrap(), BlockHeight(1));

    // Storage has new value
    assert_eq!(read(store, b"k"), Some(b"2".to_vec()));
    assert_eq!(store.committed_height().unwrap(), BlockHeight(2));
}

/// Staged writes are invisible until their scope commits, then appear together.
pub fn check_uncommitted_scope_invisible<S: KvStore>(store: &S) {
    commit_pairs(store, &[(b"k", b"before")]);

    let mut scope = store.begin_write();
    scope.set(b"k", b"after").unwrap();
    scope.set(b"other", b"staged").unwrap();
    assert_eq!(scope.staged_count(), 2);

    assert_eq!(read(store, b"k"), Some(b"before".to_vec()));
    assert_eq!(read(store, b"other"), None);

    store.commit(scope).unwrap();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.get(b"k").unwrap(), Some(b"after".to_vec()));
    assert_eq!(snapshot.get(b"other").unwrap(), Some(b"staged".to_vec()));
}

/// Dropping a scope discards its writes and leaves the height alone.
pub fn check_dropped_scope_discarded<S: KvStore>(store: &S) {
    {
        let mut scope = store.begin_write();
        scope.set(b"ghost", b"boo").unwrap();
    }
    assert_eq!(read(store, b"ghost"), None);
    assert_eq!(store.committed_height().unwrap(), BlockHeight::GENESIS);
}

/// Within one scope the last staged value for a key wins.
pub fn check_last_write_wins<S: KvStore>(store: &S) {
    let mut scope = store.begin_write();
    scope.set(b"k", b"1").unwrap();
    scope.set(b"k", b"2").unwrap();
    store.commit(scope).unwrap();
    assert_eq!(read(store, b"k"), Some(b"2".to_vec()));
}

/// Every commit advances the height, including one with no writes.
pub fn check_height_advances<S: KvStore>(store: &S) {
    assert_eq!(store.committed_height().unwrap(), BlockHeight::GENESIS);
    let empty = store.commit(store.begin_write()).unwrap();
    assert_eq!(empty.height, BlockHeight(1));
    assert_eq!(empty.writes, 0);
    let next = commit_pairs(store, &[(b"a", b"b")]);
    assert_eq!(next.height, BlockHeight(2));
    assert_eq!(store.committed_height().unwrap(), BlockHeight(2));
}

/// Empty keys and empty values are ordinary data.
pub fn check_empty_key_and_value<S: KvStore>(store: &S) {
    commit_pairs(store, &[(b"", b"v"), (b"k", b"")]);
    assert_eq!(read(store, b""), Some(b"v".to_vec()));
    assert_eq!(read(store, b"k"), Some(Vec::new()));
}

// ═══════════════════════════════════════════════════════════════════════
// Fault injection
// ═══════════════════════════════════════════════════════════════════════

/// Switches shared between a [`FaultInjectingStore`] and the test driving it.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    fail_set: Arc<AtomicBool>,
    fail_commit: Arc<AtomicBool>,
    fail_read: Arc<AtomicBool>,
}

impl Faults {
    /// Make every subsequent [`WriteScope::set`] fail.
    pub fn fail_set(&self, on: bool) {
        self.fail_set.store(on, Ordering::SeqCst);
    }

    /// Make every subsequent [`KvStore::commit`] fail without applying anything.
    pub fn fail_commit(&self, on: bool) {
        self.fail_commit.store(on, Ordering::SeqCst);
    }

    /// Make every subsequent [`ReadView::get`] fail.
    pub fn fail_read(&self, on: bool) {
        self.fail_read.store(on, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::DatabaseError(format!("injected {op} failure")))
        } else {
            Ok(())
        }
    }
}

/// Wraps a real store and fails selected operations on demand.
pub struct FaultInjectingStore<S> {
    inner: S,
    faults: Faults,
}

impl<S: KvStore> FaultInjectingStore<S> {
    /// Wrap `inner`; returns the store and the switches controlling it.
    pub fn new(inner: S) -> (Self, Faults) {
        let faults = Faults::default();
        (
            Self {
                inner,
                faults: faults.clone(),
            },
            faults,
        )
    }

    /// The wrapped store, bypassing fault injection.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

/// Snapshot of a [`FaultInjectingStore`].
pub struct FaultInjectingSnapshot<V> {
    inner: V,
    faults: Faults,
}

impl<V: ReadView> ReadView for FaultInjectingSnapshot<V> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Faults::check(&self.faults.fail_read, "read")?;
        self.inner.get(key)
    }

    fn committed_height(&self) -> Result<BlockHeight, StorageError> {
        self.inner.committed_height()
    }
}

/// Write scope of a [`FaultInjectingStore`].
pub struct FaultInjectingScope<W> {
    inner: W,
    faults: Faults,
}

impl<W: WriteScope> WriteScope for FaultInjectingScope<W> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        Faults::check(&self.faults.fail_set, "set")?;
        self.inner.set(key, value)
    }

    fn staged_count(&self) -> usize {
        self.inner.staged_count()
    }

    fn staged_bytes(&self) -> usize {
        self.inner.staged_bytes()
    }
}

impl<S: KvStore> KvStore for FaultInjectingStore<S> {
    type Snapshot<'a>
        = FaultInjectingSnapshot<S::Snapshot<'a>>
    where
        Self: 'a;
    type WriteScope = FaultInjectingScope<S::WriteScope>;

    fn snapshot(&self) -> Self::Snapshot<'_> {
        FaultInjectingSnapshot {
            inner: self.inner.snapshot(),
            faults: self.faults.clone(),
        }
    }

    fn begin_write(&self) -> Self::WriteScope {
        FaultInjectingScope {
            inner: self.inner.begin_write(),
            faults: self.faults.clone(),
        }
    }

    fn commit(&self, scope: Self::WriteScope) -> Result<CommitResult, StorageError> {
        Faults::check(&self.faults.fail_commit, "commit")?;
        self.inner.commit(scope.inner)
    }

    fn committed_height(&self) -> Result<BlockHeight, StorageError> {
        self.inner.committed_height()
    }
}

//! In-memory key-value store.

use crate::error::{StorageError, StorageResult};
use crate::store::{DeleteOptions, KeyValueStore, PutOptions, RangeQuery};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::thread::{self, ThreadId};

type Rows = BTreeMap<Vec<u8>, Vec<u8>>;

/// Previous value of a key touched inside a transaction.
type UndoEntry = (Vec<u8>, Option<Vec<u8>>);

#[derive(Debug, Default)]
struct TxnState {
    owner: Option<ThreadId>,
    depth: usize,
    rollback_only: bool,
    undo: Vec<UndoEntry>,
}

/// An in-memory ordered key-value store.
///
/// Suitable for:
/// - Unit and integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// A thread inside a transaction is the only one with access until its
/// outermost scope commits or rolls back. Other threads' reads and writes
/// wait for it, so readers only observe committed data.
///
/// # Example
///
/// ```rust
/// use replog_storage::{KeyValueStore, MemoryStore, PutOptions};
///
/// let store = MemoryStore::new();
/// store.put(b"key", b"value", PutOptions::default()).unwrap();
/// assert_eq!(store.get(b"key").unwrap(), Some(b"value".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Rows>,
    txn: Mutex<TxnState>,
    released: Condvar,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read(Rows::len)
    }

    /// Returns `true` if the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read(Rows::is_empty)
    }

    /// Runs a read, waiting for a transaction owned by another thread to
    /// end first.
    fn read<R>(&self, op: impl FnOnce(&Rows) -> R) -> R {
        let me = thread::current().id();
        let mut txn = self.txn.lock();
        while txn.owner.is_some_and(|owner| owner != me) {
            self.released.wait(&mut txn);
        }
        let rows = self.rows.read();
        op(&rows)
    }

    /// Runs a mutation, recording undo information when the calling thread
    /// owns the transaction and waiting for a foreign transaction otherwise.
    fn write<R>(
        &self,
        op: impl FnOnce(&mut Rows, &mut Vec<UndoEntry>) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let me = thread::current().id();
        let mut txn = self.txn.lock();
        while txn.owner.is_some_and(|owner| owner != me) {
            self.released.wait(&mut txn);
        }

        let mut rows = self.rows.write();
        if txn.owner == Some(me) {
            op(&mut rows, &mut txn.undo)
        } else {
            op(&mut rows, &mut Vec::new())
        }
    }

    fn undo_all(&self, txn: &mut TxnState) {
        let mut rows = self.rows.write();
        for (key, previous) in txn.undo.drain(..).rev() {
            match previous {
                Some(value) => {
                    rows.insert(key, value);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }
    }

    fn release(&self, txn: &mut TxnState) {
        txn.owner = None;
        txn.depth = 0;
        txn.rollback_only = false;
        txn.undo.clear();
        self.released.notify_all();
    }
}

fn select(rows: &Rows, query: &RangeQuery) -> Vec<(Vec<u8>, Vec<u8>)> {
    let lower = match &query.start_after {
        Some(after) if after.as_slice() >= query.prefix.as_slice() => {
            Bound::Excluded(after.clone())
        }
        _ => Bound::Included(query.prefix.clone()),
    };

    let mut selected: Vec<_> = rows
        .range((lower, Bound::Unbounded))
        .take_while(|(key, _)| key.starts_with(&query.prefix))
        .take_while(|(key, _)| {
            query
                .end
                .as_deref()
                .map_or(true, |end| key.as_slice() <= end)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if query.reverse {
        selected.reverse();
    }
    if let Some(limit) = query.limit {
        selected.truncate(limit);
    }
    selected
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.read(|rows| rows.get(key).cloned()))
    }

    fn put(&self, key: &[u8], value: &[u8], options: PutOptions) -> StorageResult<()> {
        self.write(|rows, undo| {
            if options.error_if_exists && rows.contains_key(key) {
                return Err(StorageError::KeyExists { key: key.to_vec() });
            }
            let previous = rows.insert(key.to_vec(), value.to_vec());
            undo.push((key.to_vec(), previous));
            Ok(())
        })
    }

    fn delete(&self, key: &[u8], options: DeleteOptions) -> StorageResult<bool> {
        self.write(|rows, undo| match rows.remove(key) {
            Some(previous) => {
                undo.push((key.to_vec(), Some(previous)));
                Ok(true)
            }
            None if options.error_if_missing => {
                Err(StorageError::KeyMissing { key: key.to_vec() })
            }
            None => Ok(false),
        })
    }

    fn get_range(&self, query: &RangeQuery) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self.read(|rows| select(rows, query)))
    }

    fn delete_range(&self, query: &RangeQuery) -> StorageResult<usize> {
        self.write(|rows, undo| {
            let selected = select(rows, query);
            for (key, _) in &selected {
                if let Some(previous) = rows.remove(key) {
                    undo.push((key.clone(), Some(previous)));
                }
            }
            Ok(selected.len())
        })
    }

    fn begin_transaction(&self) -> StorageResult<()> {
        let me = thread::current().id();
        let mut txn = self.txn.lock();
        if txn.owner == Some(me) {
            txn.depth += 1;
            return Ok(());
        }
        while txn.owner.is_some() {
            self.released.wait(&mut txn);
        }
        txn.owner = Some(me);
        txn.depth = 1;
        Ok(())
    }

    fn commit_transaction(&self) -> StorageResult<()> {
        let mut txn = self.txn.lock();
        if txn.owner != Some(thread::current().id()) {
            return Err(StorageError::NoTransaction);
        }

        txn.depth -= 1;
        if txn.depth > 0 {
            return Ok(());
        }

        let failed = txn.rollback_only;
        if failed {
            self.undo_all(&mut txn);
        }
        self.release(&mut txn);

        if failed {
            Err(StorageError::RolledBack("a nested scope failed".into()))
        } else {
            Ok(())
        }
    }

    fn rollback_transaction(&self) -> StorageResult<()> {
        let mut txn = self.txn.lock();
        if txn.owner != Some(thread::current().id()) {
            return Err(StorageError::NoTransaction);
        }

        if txn.depth > 1 {
            txn.depth -= 1;
            txn.rollback_only = true;
            return Ok(());
        }

        self.undo_all(&mut txn);
        self.release(&mut txn);
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.txn.lock().owner == Some(thread::current().id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::run_in_transaction;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    fn put(store: &MemoryStore, key: &[u8], value: &[u8]) {
        store.put(key, value, PutOptions::default()).unwrap();
    }

    fn keys(rows: Vec<(Vec<u8>, Vec<u8>)>) -> Vec<Vec<u8>> {
        rows.into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn memory_new_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get(b"missing").unwrap(), None);
    }

    #[test]
    fn put_overwrites_by_default() {
        let store = MemoryStore::new();
        put(&store, b"k", b"1");
        put(&store, b"k", b"2");
        assert_eq!(store.get(b"k").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_error_if_exists_fails_on_collision() {
        let store = MemoryStore::new();
        put(&store, b"k", b"1");

        let result = store.put(b"k", b"2", PutOptions::create_only());
        assert!(matches!(result, Err(StorageError::KeyExists { .. })));
        assert_eq!(store.get(b"k").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn delete_reports_presence() {
        let store = MemoryStore::new();
        put(&store, b"k", b"1");

        assert!(store.delete(b"k", DeleteOptions::default()).unwrap());
        assert!(!store.delete(b"k", DeleteOptions::default()).unwrap());
        assert!(matches!(
            store.delete(b"k", DeleteOptions::must_exist()),
            Err(StorageError::KeyMissing { .. })
        ));
    }

    #[test]
    fn range_honours_prefix_bounds_limit_and_order() {
        let store = MemoryStore::new();
        for key in [&b"a1"[..], b"b1", b"b2", b"b3", b"b4", b"c1"] {
            put(&store, key, b"");
        }

        let all_b = store.get_range(&RangeQuery::prefix(b"b".to_vec())).unwrap();
        assert_eq!(
            keys(all_b),
            vec![b"b1".to_vec(), b"b2".to_vec(), b"b3".to_vec(), b"b4".to_vec()]
        );

        let window = RangeQuery::prefix(b"b".to_vec())
            .start_after(b"b1".to_vec())
            .end(b"b3".to_vec());
        assert_eq!(
            keys(store.get_range(&window).unwrap()),
            vec![b"b2".to_vec(), b"b3".to_vec()]
        );

        let last = RangeQuery::prefix(b"b".to_vec()).reverse().limit(1);
        assert_eq!(keys(store.get_range(&last).unwrap()), vec![b"b4".to_vec()]);

        assert_eq!(store.count(&RangeQuery::prefix(b"b".to_vec())).unwrap(), 4);
    }

    #[test]
    fn start_after_beyond_prefix_is_empty() {
        let store = MemoryStore::new();
        put(&store, b"b1", b"");
        let query = RangeQuery::prefix(b"b".to_vec()).start_after(b"c".to_vec());
        assert!(store.get_range(&query).unwrap().is_empty());
    }

    #[test]
    fn delete_range_removes_matching_rows() {
        let store = MemoryStore::new();
        for key in [&b"s1"[..], b"s2", b"s3", b"t1"] {
            put(&store, key, b"");
        }

        let removed = store
            .delete_range(&RangeQuery::prefix(b"s".to_vec()).end(b"s2".to_vec()))
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            keys(store.get_range(&RangeQuery::default()).unwrap()),
            vec![b"s3".to_vec(), b"t1".to_vec()]
        );
    }

    #[test]
    fn failed_transaction_is_rolled_back() {
        let store = MemoryStore::new();
        put(&store, b"keep", b"old");

        let result: StorageResult<()> = run_in_transaction(&store, || {
            store.put(b"keep", b"new", PutOptions::default())?;
            store.put(b"extra", b"x", PutOptions::default())?;
            store.delete(b"keep", DeleteOptions::default())?;
            Err(StorageError::RolledBack("boom".into()))
        });

        assert!(result.is_err());
        assert!(!store.in_transaction());
        assert_eq!(store.get(b"keep").unwrap(), Some(b"old".to_vec()));
        assert_eq!(store.get(b"extra").unwrap(), None);
    }

    #[test]
    fn nested_failure_rolls_back_outer_transaction() {
        let store = MemoryStore::new();

        let result: StorageResult<()> = run_in_transaction(&store, || {
            store.put(b"outer", b"1", PutOptions::default())?;
            let inner: StorageResult<()> = run_in_transaction(&store, || {
                store.put(b"inner", b"1", PutOptions::default())?;
                Err(StorageError::NoTransaction)
            });
            assert!(inner.is_err());
            Ok(())
        });

        assert!(matches!(result, Err(StorageError::RolledBack(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn nested_success_commits_with_outer() {
        let store = MemoryStore::new();
        let result: StorageResult<()> = run_in_transaction(&store, || {
            run_in_transaction(&store, || store.put(b"a", b"1", PutOptions::default()))?;
            assert!(store.in_transaction());
            store.put(b"b", b"2", PutOptions::default())
        });
        assert!(result.is_ok());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn commit_without_transaction_fails() {
        let store = MemoryStore::new();
        assert!(matches!(store.commit_transaction(), Err(StorageError::NoTransaction)));
        assert!(matches!(store.rollback_transaction(), Err(StorageError::NoTransaction)));
    }

    #[test]
    fn foreign_writer_waits_for_transaction() {
        let store = Arc::new(MemoryStore::new());
        store.begin_transaction().unwrap();
        store.put(b"owner", b"1", PutOptions::default()).unwrap();

        let (tx, rx) = mpsc::channel();
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                assert!(!store.in_transaction());
                store.put(b"foreign", b"1", PutOptions::default()).unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(store.get(b"foreign").unwrap(), None);

        store.commit_transaction().unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        writer.join().unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn foreign_reader_sees_only_committed_rows() {
        let store = Arc::new(MemoryStore::new());
        put(&store, b"kept", b"old");
        store.begin_transaction().unwrap();
        put(&store, b"kept", b"new");
        put(&store, b"ghost", b"1");
        assert_eq!(store.get(b"ghost").unwrap(), Some(b"1".to_vec()));

        let (tx, rx) = mpsc::channel();
        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let ghost = store.get(b"ghost").unwrap();
                let all = store.get_range(&RangeQuery::default()).unwrap();
                tx.send((ghost, all)).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        store.rollback_transaction().unwrap();

        let (ghost, all) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        reader.join().unwrap();
        assert_eq!(ghost, None);
        assert_eq!(all, vec![(b"kept".to_vec(), b"old".to_vec())]);
    }

    #[test]
    fn foreign_reader_sees_committed_transaction_whole() {
        let store = Arc::new(MemoryStore::new());
        store.begin_transaction().unwrap();
        put(&store, b"head", b"1");

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.get_range(&RangeQuery::default()).unwrap())
        };

        thread::sleep(Duration::from_millis(20));
        put(&store, b"row1", b"x");
        store.commit_transaction().unwrap();

        assert_eq!(keys(reader.join().unwrap()), vec![b"head".to_vec(), b"row1".to_vec()]);
    }
}

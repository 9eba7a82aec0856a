//! Key-value store trait definition.

use crate::error::{StorageError, StorageResult};

/// Options for [`KeyValueStore::put`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Fail with [`StorageError::KeyExists`] instead of overwriting.
    pub error_if_exists: bool,
}

impl PutOptions {
    /// Options that refuse to overwrite an existing value.
    #[must_use]
    pub fn create_only() -> Self {
        Self {
            error_if_exists: true,
        }
    }
}

/// Options for [`KeyValueStore::delete`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Fail with [`StorageError::KeyMissing`] when there is nothing to delete.
    pub error_if_missing: bool,
}

impl DeleteOptions {
    /// Options that require the key to exist.
    #[must_use]
    pub fn must_exist() -> Self {
        Self {
            error_if_missing: true,
        }
    }
}

/// A ranged read or delete over the keys sharing a prefix.
///
/// Bounds are full keys: `start_after` is exclusive, `end` is inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeQuery {
    /// Only keys starting with these bytes are visited.
    pub prefix: Vec<u8>,
    /// Exclusive lower bound.
    pub start_after: Option<Vec<u8>>,
    /// Inclusive upper bound.
    pub end: Option<Vec<u8>>,
    /// Maximum number of rows to visit.
    pub limit: Option<usize>,
    /// Visit keys in descending order.
    pub reverse: bool,
}

impl RangeQuery {
    /// Creates a query over every key starting with `prefix`.
    #[must_use]
    pub fn prefix(prefix: Vec<u8>) -> Self {
        Self {
            prefix,
            ..Self::default()
        }
    }

    /// Sets the exclusive lower bound.
    #[must_use]
    pub fn start_after(mut self, key: Vec<u8>) -> Self {
        self.start_after = Some(key);
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn end(mut self, key: Vec<u8>) -> Self {
        self.end = Some(key);
        self
    }

    /// Limits the number of visited rows.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Visits keys in descending order.
    #[must_use]
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Returns `true` if `key` falls inside the prefix and bounds.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
            && self.start_after.as_deref().map_or(true, |lo| key > lo)
            && self.end.as_deref().map_or(true, |hi| key <= hi)
    }
}

/// An ordered key-value store.
///
/// Keys sort bytewise. Values are opaque.
///
/// # Transactions
///
/// A transaction belongs to the thread that began it. Calling
/// `begin_transaction` again on that thread nests: the nested scope joins
/// the outer one, and rolling it back marks the whole transaction as
/// rollback-only. Reads and writes from other threads wait until the owner
/// commits or rolls back, so they never observe uncommitted data. Use
/// [`run_in_transaction`] rather than pairing the calls by hand.
///
/// # Implementors
///
/// - [`super::MemoryStore`] - `BTreeMap` engine for tests and ephemeral stores
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be read.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::KeyExists`] if `options.error_if_exists` is
    /// set and the key is present.
    fn put(&self, key: &[u8], value: &[u8], options: PutOptions) -> StorageResult<()>;

    /// Removes `key`, returning whether something was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::KeyMissing`] if `options.error_if_missing` is
    /// set and the key is absent.
    fn delete(&self, key: &[u8], options: DeleteOptions) -> StorageResult<bool>;

    /// Returns the rows matched by `query`, in key order (or reverse).
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be read.
    fn get_range(&self, query: &RangeQuery) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Removes the rows matched by `query`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be written.
    fn delete_range(&self, query: &RangeQuery) -> StorageResult<usize>;

    /// Counts the rows matched by `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be read.
    fn count(&self, query: &RangeQuery) -> StorageResult<usize> {
        Ok(self.get_range(query)?.len())
    }

    /// Begins (or joins) a transaction owned by the calling thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot start a transaction.
    fn begin_transaction(&self) -> StorageResult<()>;

    /// Commits the innermost scope. The outermost commit makes the writes
    /// permanent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoTransaction`] if the calling thread owns no
    /// transaction, or [`StorageError::RolledBack`] if a nested scope failed.
    fn commit_transaction(&self) -> StorageResult<()>;

    /// Rolls back the innermost scope.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoTransaction`] if the calling thread owns no
    /// transaction.
    fn rollback_transaction(&self) -> StorageResult<()>;

    /// Returns `true` if the calling thread is inside a transaction.
    fn in_transaction(&self) -> bool;
}

/// Runs `f` inside a transaction on `store`.
///
/// Commits when `f` returns `Ok` and rolls back when it returns `Err`.
/// Nested calls join the enclosing transaction.
///
/// # Errors
///
/// Returns the error produced by `f`, or the storage error raised while
/// beginning or committing.
pub fn run_in_transaction<S, T, E, F>(store: &S, f: F) -> Result<T, E>
where
    S: KeyValueStore + ?Sized,
    E: From<StorageError>,
    F: FnOnce() -> Result<T, E>,
{
    store.begin_transaction()?;
    match f() {
        Ok(value) => {
            store.commit_transaction()?;
            Ok(value)
        }
        Err(err) => {
            // The original error is more useful than a failed rollback.
            let _ = store.rollback_transaction();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_contains_respects_bounds() {
        let query = RangeQuery::prefix(b"k".to_vec())
            .start_after(b"k1".to_vec())
            .end(b"k3".to_vec());

        assert!(!query.contains(b"k1"));
        assert!(query.contains(b"k2"));
        assert!(query.contains(b"k3"));
        assert!(!query.contains(b"k4"));
        assert!(!query.contains(b"j2"));
    }

    #[test]
    fn put_options_defaults_overwrite() {
        assert!(!PutOptions::default().error_if_exists);
        assert!(PutOptions::create_only().error_if_exists);
        assert!(DeleteOptions::must_exist().error_if_missing);
    }
}

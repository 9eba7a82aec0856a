//! Per-store change log.
//!
//! The log keeps at most one pending entry per entity, in two indexes kept
//! consistent inside the writing transaction:
//!
//! - by primary key: `primaryKey -> sequence`, to find and retire the
//!   entity's previous entry
//! - by sequence: `sequence -> entry`, the ordered log used for replay and
//!   truncation
//!
//! Writes applied by a synchronizer ([`WriteSource::ReplicationApply`]) only
//! retire the pending entry and never create one, which keeps a pulled
//! change from being sent back to where it came from.

use crate::codec::{decode, encode};
use crate::config::ChangeLogConfig;
use crate::error::{CoreError, CoreResult};
use crate::keys::StoreKeys;
use crate::record::RecordHandle;
use parking_lot::Mutex;
use replog_protocol::{
    Entity, FindOptions, LogCursor, LogEntry, LogPage, LogReader, WriteOptions, WriteSource,
};
use replog_storage::{
    run_in_transaction, DeleteOptions, KeyValueStore, PutOptions, RangeQuery, StorageError,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Kind of entity write being logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Insert or replace.
    Put,
    /// Removal.
    Delete,
}

/// Diagnostic counters of a change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStatistics {
    /// Last assigned sequence number.
    pub last_log_sequence: u64,
    /// Rows in the by-primary-key index.
    pub primary_key_index_count: usize,
    /// Rows in the by-sequence index.
    pub sequence_index_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogRow {
    sequence: u64,
    primary_key: String,
    #[serde(default, skip_serializing_if = "is_false")]
    is_deleted: bool,
    origin_store_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    projection: Option<Map<String, Value>>,
}

impl LogRow {
    fn into_entry(self) -> LogEntry {
        LogEntry {
            sequence: self.sequence,
            primary_key: self.primary_key,
            is_deleted: self.is_deleted,
            origin_store_id: self.origin_store_id,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PrimaryKeyRow {
    sequence: u64,
}

/// Change log of one store.
///
/// Obtained from [`Repository::change_log`](crate::Repository::change_log)
/// after enabling it with
/// [`Repository::with_change_log`](crate::Repository::with_change_log).
pub struct ChangeLog {
    config: ChangeLogConfig,
    store: Arc<dyn KeyValueStore>,
    keys: StoreKeys,
    records: RecordHandle,
    sequence_lock: Mutex<()>,
}

impl ChangeLog {
    pub(crate) fn new(
        config: ChangeLogConfig,
        store: Arc<dyn KeyValueStore>,
        keys: StoreKeys,
        records: RecordHandle,
    ) -> Self {
        Self {
            config,
            store,
            keys,
            records,
            sequence_lock: Mutex::new(()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ChangeLogConfig {
        &self.config
    }

    /// Records a write of `entity`.
    ///
    /// Must run inside the transaction of the entity write. Writes to
    /// excluded collections and computed writes are ignored.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Precondition`] outside a transaction
    /// - [`CoreError::SequenceConflict`] if the new sequence is already taken
    pub fn record_mutation(
        &self,
        entity: &Entity,
        mutation: Mutation,
        options: &WriteOptions,
    ) -> CoreResult<()> {
        if self.config.is_excluded(&entity.collection) {
            return Ok(());
        }
        if options.source == WriteSource::Computed {
            return Ok(());
        }
        if !self.store.in_transaction() {
            return Err(CoreError::precondition(
                "change log mutations must run inside a transaction",
            ));
        }

        let origin_store_id = match &options.origin_store_id {
            Some(origin) => origin.clone(),
            None => self.records.load()?.store_id,
        };

        let primary_key = entity.id.as_str();
        let primary_key_key = self.keys.primary_key_entry(primary_key);
        let pending = self.store.get(&primary_key_key)?;

        if let Some(bytes) = &pending {
            let previous: PrimaryKeyRow = decode(bytes)?;
            let removed = self
                .store
                .delete(&self.keys.sequence_entry(previous.sequence), DeleteOptions::default())?;
            if !removed {
                warn!(
                    primary_key,
                    sequence = previous.sequence,
                    "pending log entry missing while coalescing"
                );
            }
        }

        if options.source == WriteSource::ReplicationApply {
            if pending.is_some() {
                self.store.delete(&primary_key_key, DeleteOptions::default())?;
            }
            return Ok(());
        }

        let sequence = self.next_sequence()?;
        self.store.put(
            &primary_key_key,
            &encode(&PrimaryKeyRow { sequence })?,
            PutOptions::default(),
        )?;

        let row = LogRow {
            sequence,
            primary_key: primary_key.to_string(),
            is_deleted: mutation == Mutation::Delete,
            origin_store_id,
            projection: self.project(entity),
        };
        self.store
            .put(
                &self.keys.sequence_entry(sequence),
                &encode(&row)?,
                PutOptions::create_only(),
            )
            .map_err(|err| match err {
                StorageError::KeyExists { .. } => CoreError::SequenceConflict { sequence },
                other => other.into(),
            })?;

        debug!(primary_key, sequence, deleted = row.is_deleted, "logged mutation");
        Ok(())
    }

    /// Returns the identity and head of the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the store record cannot be read.
    pub fn cursor(&self) -> CoreResult<LogCursor> {
        let record = self.records.load()?;
        Ok(LogCursor {
            store_id: record.store_id,
            last_log_sequence: record.last_log_sequence,
        })
    }

    /// Returns the pending entries after `sequence`, up to the current head.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn find_entries_after(&self, sequence: u64, options: &FindOptions) -> CoreResult<LogPage> {
        let cursor = self.cursor()?;
        let mut items = Vec::new();

        if cursor.last_log_sequence > sequence {
            let query = RangeQuery::prefix(self.keys.sequence_index())
                .start_after(self.keys.sequence_entry(sequence))
                .end(self.keys.sequence_entry(cursor.last_log_sequence));

            for (_, bytes) in self.store.get_range(&query)? {
                let row: LogRow = decode(&bytes)?;
                if !options.accepts_origin(&row.origin_store_id) {
                    continue;
                }
                if let Some(filter) = &options.filter {
                    if !filter.matches(&row.primary_key, row.projection.as_ref()) {
                        continue;
                    }
                }
                items.push(row.into_entry());
            }
        }

        Ok(LogPage {
            store_id: cursor.store_id,
            last_log_sequence: cursor.last_log_sequence,
            items,
        })
    }

    /// Removes every entry with a sequence up to `sequence`, with their
    /// primary-key rows. Returns the number of removed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or written.
    pub fn truncate_up_to(&self, sequence: u64) -> CoreResult<usize> {
        let query =
            RangeQuery::prefix(self.keys.sequence_index()).end(self.keys.sequence_entry(sequence));

        run_in_transaction(self.store.as_ref(), || {
            for (_, bytes) in self.store.get_range(&query)? {
                let row: LogRow = decode(&bytes)?;
                self.retire_primary_key(&row, "truncating")?;
            }
            let removed = self.store.delete_range(&query)?;
            debug!(sequence, removed, "truncated change log");
            Ok(removed)
        })
    }

    /// Returns index counts and the head of the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn statistics(&self) -> CoreResult<LogStatistics> {
        let cursor = self.cursor()?;
        Ok(LogStatistics {
            last_log_sequence: cursor.last_log_sequence,
            primary_key_index_count: self
                .store
                .count(&RangeQuery::prefix(self.keys.primary_key_index()))?,
            sequence_index_count: self
                .store
                .count(&RangeQuery::prefix(self.keys.sequence_index()))?,
        })
    }

    /// Permanently removes tombstone entries. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or written.
    pub fn discard_tombstones(&self) -> CoreResult<usize> {
        let query = RangeQuery::prefix(self.keys.sequence_index());

        run_in_transaction(self.store.as_ref(), || {
            let mut discarded = 0;
            for (key, bytes) in self.store.get_range(&query)? {
                let row: LogRow = decode(&bytes)?;
                if !row.is_deleted {
                    continue;
                }
                self.store.delete(&key, DeleteOptions::default())?;
                self.retire_primary_key(&row, "discarding tombstone")?;
                discarded += 1;
            }
            debug!(discarded, "discarded tombstones");
            Ok(discarded)
        })
    }

    /// Returns the sequence of the pending entry of `primary_key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn pending_sequence(&self, primary_key: &str) -> CoreResult<Option<u64>> {
        self.store
            .get(&self.keys.primary_key_entry(primary_key))?
            .map(|bytes| decode::<PrimaryKeyRow>(&bytes).map(|row| row.sequence))
            .transpose()
    }

    fn retire_primary_key(&self, row: &LogRow, during: &str) -> CoreResult<()> {
        let removed = self.store.delete(
            &self.keys.primary_key_entry(&row.primary_key),
            DeleteOptions::default(),
        )?;
        if !removed {
            warn!(
                primary_key = %row.primary_key,
                sequence = row.sequence,
                "primary key index entry missing while {during}"
            );
        }
        Ok(())
    }

    fn next_sequence(&self) -> CoreResult<u64> {
        let _guard = self.sequence_lock.lock();
        self.records.update(|record| {
            record.last_log_sequence += 1;
            record.last_log_sequence
        })
    }

    fn project(&self, entity: &Entity) -> Option<Map<String, Value>> {
        let projection: Map<String, Value> = self
            .config
            .projection
            .iter()
            .filter_map(|field| match entity.get(field) {
                Some(Value::Null) | None => None,
                Some(value) => Some((field.clone(), value.clone())),
            })
            .collect();
        (!projection.is_empty()).then_some(projection)
    }
}

impl LogReader for ChangeLog {
    type Error = CoreError;

    fn cursor(&self) -> CoreResult<LogCursor> {
        ChangeLog::cursor(self)
    }

    fn find_entries_after(&self, sequence: u64, options: &FindOptions) -> CoreResult<LogPage> {
        ChangeLog::find_entries_after(self, sequence, options)
    }
}

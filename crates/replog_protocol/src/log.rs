//! Change-log read model.

use crate::filter::LogFilter;
use serde::{Deserialize, Serialize};

/// Identity and head of one store's change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogCursor {
    /// Identity of the store owning the log.
    pub store_id: String,
    /// Highest sequence number assigned so far.
    pub last_log_sequence: u64,
}

/// One pending change, as seen by log readers.
///
/// The filter projection stored alongside an entry is never part of this
/// shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Position in the log.
    pub sequence: u64,
    /// Primary key of the changed entity.
    pub primary_key: String,
    /// `true` when the entity was deleted.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_deleted: bool,
    /// Store where the change was first made.
    pub origin_store_id: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Result of a ranged log read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    /// Identity of the store owning the log.
    pub store_id: String,
    /// Head of the log at read time. Consumers use it as their new cursor.
    pub last_log_sequence: u64,
    /// Matching entries, in ascending sequence order.
    pub items: Vec<LogEntry>,
}

impl LogPage {
    /// Returns the cursor part of the page.
    pub fn cursor(&self) -> LogCursor {
        LogCursor {
            store_id: self.store_id.clone(),
            last_log_sequence: self.last_log_sequence,
        }
    }
}

/// Options for [`LogReader::find_entries_after`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Skip entries that originated in this store.
    pub ignore_origin_store_id: Option<String>,
    /// Keep only entries whose projection matches.
    pub filter: Option<LogFilter>,
}

impl FindOptions {
    /// Creates options that return every entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips entries originated by `store_id`.
    pub fn ignoring_origin(mut self, store_id: impl Into<String>) -> Self {
        self.ignore_origin_store_id = Some(store_id.into());
        self
    }

    /// Sets the projection filter.
    pub fn with_filter(mut self, filter: LogFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Returns `true` if `entry` passes the origin check.
    pub fn accepts_origin(&self, origin_store_id: &str) -> bool {
        self.ignore_origin_store_id.as_deref() != Some(origin_store_id)
    }
}

/// Read access to a change log, local or remote.
pub trait LogReader {
    /// Error returned by reads.
    type Error;

    /// Returns the log's identity and head.
    fn cursor(&self) -> Result<LogCursor, Self::Error>;

    /// Returns the entries with a sequence greater than `sequence`, up to the
    /// current head, in ascending order.
    fn find_entries_after(
        &self,
        sequence: u64,
        options: &FindOptions,
    ) -> Result<LogPage, Self::Error>;
}

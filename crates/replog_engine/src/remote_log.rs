//! Read access to a remote change log.

use crate::connection::RemoteConnection;
use crate::error::{SyncError, SyncResult};
use replog_protocol::query::encode_find_query;
use replog_protocol::{FindOptions, LogCursor, LogPage, LogReader};
use std::sync::Arc;

/// Reads the change log of a remote store through its log endpoint.
///
/// Offers the same read contract as the local
/// [`ChangeLog`](replog_core::ChangeLog). Changes are pushed through
/// [`RemoteRepository`](crate::RemoteRepository), never through this client.
#[derive(Debug, Clone)]
pub struct RemoteLogClient {
    connection: Arc<RemoteConnection>,
}

impl RemoteLogClient {
    /// Creates a client over `connection`.
    pub fn new(connection: Arc<RemoteConnection>) -> Self {
        Self { connection }
    }

    /// Fetches the remote log cursor.
    ///
    /// # Errors
    ///
    /// Returns a transport or decoding error.
    pub fn cursor(&self) -> SyncResult<LogCursor> {
        self.connection.get_json("history", &[])
    }

    /// Fetches the remote entries after `sequence`, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns a transport or decoding error.
    pub fn find_entries_after(&self, sequence: u64, options: &FindOptions) -> SyncResult<LogPage> {
        self.connection
            .get_json("history-items", &encode_find_query(sequence, options))
    }
}

impl LogReader for RemoteLogClient {
    type Error = SyncError;

    fn cursor(&self) -> SyncResult<LogCursor> {
        RemoteLogClient::cursor(self)
    }

    fn find_entries_after(&self, sequence: u64, options: &FindOptions) -> SyncResult<LogPage> {
        RemoteLogClient::find_entries_after(self, sequence, options)
    }
}

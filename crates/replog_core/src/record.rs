//! The store record: identity and replication counters of one store.

use crate::codec::{decode, encode};
use crate::error::CoreResult;
use replog_storage::{run_in_transaction, KeyValueStore, PutOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Singleton record of a store.
///
/// Created lazily on first access with a fresh random identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Stable identity of the store.
    #[serde(rename = "storeId")]
    pub store_id: String,
    /// Last sequence number assigned by the change log.
    #[serde(rename = "lastHistorySequence", default)]
    pub last_log_sequence: u64,
    /// Identity of the synchronization peer, learned on first contact.
    #[serde(
        rename = "remoteStoreId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub peer_store_id: Option<String>,
    /// Replication cursor into the peer's log.
    #[serde(
        rename = "remoteHistoryLastSequenceNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub peer_last_seen_sequence: Option<u64>,
}

impl StoreRecord {
    /// Creates a record with a new random identity.
    pub fn generate() -> Self {
        Self {
            store_id: Uuid::new_v4().to_string(),
            last_log_sequence: 0,
            peer_store_id: None,
            peer_last_seen_sequence: None,
        }
    }
}

/// Shared access to the stored record of one store.
#[derive(Clone)]
pub(crate) struct RecordHandle {
    store: Arc<dyn KeyValueStore>,
    key: Vec<u8>,
}

impl RecordHandle {
    pub(crate) fn new(store: Arc<dyn KeyValueStore>, key: Vec<u8>) -> Self {
        Self { store, key }
    }

    /// Reads the record, creating it on first access.
    pub(crate) fn load(&self) -> CoreResult<StoreRecord> {
        if let Some(bytes) = self.store.get(&self.key)? {
            return decode(&bytes);
        }

        run_in_transaction(self.store.as_ref(), || {
            if let Some(bytes) = self.store.get(&self.key)? {
                return decode(&bytes);
            }
            let record = StoreRecord::generate();
            self.store
                .put(&self.key, &encode(&record)?, PutOptions::create_only())?;
            debug!(store_id = %record.store_id, "created store record");
            Ok(record)
        })
    }

    /// Applies `f` to the record and persists it, atomically.
    pub(crate) fn update<T>(&self, f: impl FnOnce(&mut StoreRecord) -> T) -> CoreResult<T> {
        run_in_transaction(self.store.as_ref(), || {
            let mut record = self.load()?;
            let output = f(&mut record);
            self.store
                .put(&self.key, &encode(&record)?, PutOptions::default())?;
            Ok(output)
        })
    }
}

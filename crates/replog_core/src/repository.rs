//! Local repository: entities and store record over a key-value store.

use crate::change_log::{ChangeLog, Mutation};
use crate::codec::{decode, encode};
use crate::config::ChangeLogConfig;
use crate::error::{CoreError, CoreResult};
use crate::keys::StoreKeys;
use crate::record::{RecordHandle, StoreRecord};
use parking_lot::RwLock;
use replog_protocol::{Entity, EntityStore, WriteOptions};
use replog_storage::{
    run_in_transaction, DeleteOptions, KeyValueStore, MemoryStore, PutOptions, RangeQuery,
};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::info;

/// Repository lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The repository is about to remove all of its data.
    WillDestroy,
    /// The repository removed all of its data. A new identity is generated
    /// on next access.
    DidDestroy,
}

/// Receives [`LifecycleEvent`]s synchronously, on the destroying thread.
pub trait LifecycleListener: Send + Sync {
    /// Called for each lifecycle event.
    fn on_lifecycle(&self, event: LifecycleEvent);
}

/// One store: entities, its [`StoreRecord`] and an optional [`ChangeLog`].
///
/// Every entity write runs in a transaction together with its change-log
/// entry.
pub struct Repository {
    name: String,
    store: Arc<dyn KeyValueStore>,
    keys: StoreKeys,
    records: RecordHandle,
    change_log: Option<ChangeLog>,
    listeners: RwLock<Vec<Weak<dyn LifecycleListener>>>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .field("change_log", &self.change_log.is_some())
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Creates a repository named `name` over `store`.
    ///
    /// Several repositories may share one store as long as their names
    /// differ.
    pub fn new(name: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        let name = name.into();
        let keys = StoreKeys::new(name.clone());
        let records = RecordHandle::new(Arc::clone(&store), keys.record());
        Self {
            name,
            store,
            keys,
            records,
            change_log: None,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Creates a repository over a fresh [`MemoryStore`].
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(MemoryStore::new()))
    }

    /// Enables change tracking.
    #[must_use]
    pub fn with_change_log(mut self, config: ChangeLogConfig) -> Self {
        self.change_log = Some(ChangeLog::new(
            config,
            Arc::clone(&self.store),
            self.keys.clone(),
            self.records.clone(),
        ));
        self
    }

    /// Returns the repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying key-value store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Returns the change log, if enabled.
    pub fn change_log(&self) -> Option<&ChangeLog> {
        self.change_log.as_ref()
    }

    /// Returns the store identity, creating the store record if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store record cannot be read or created.
    pub fn store_id(&self) -> CoreResult<String> {
        Ok(self.records.load()?.store_id)
    }

    /// Reads the store record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store record cannot be read or created.
    pub fn load_record(&self) -> CoreResult<StoreRecord> {
        self.records.load()
    }

    /// Applies `f` to the store record and persists it in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store record cannot be read or written.
    pub fn update_record<T>(&self, f: impl FnOnce(&mut StoreRecord) -> T) -> CoreResult<T> {
        self.records.update(f)
    }

    /// Runs `f` in a transaction. Nested calls join the outer transaction.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or a storage error on begin or commit.
    pub fn transaction<T>(&self, f: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        run_in_transaction(self.store.as_ref(), f)
    }

    /// Returns `true` if the calling thread is inside a transaction.
    pub fn is_inside_transaction(&self) -> bool {
        self.store.in_transaction()
    }

    /// Reads an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity cannot be read or decoded.
    pub fn get_by_id(&self, id: &str) -> CoreResult<Option<Entity>> {
        self.store
            .get(&self.keys.item(id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Inserts or replaces an entity and logs the change.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] when the entity is missing and
    /// `options.create_if_missing` is false, or any storage or log error.
    pub fn save(&self, entity: &Entity, options: &WriteOptions) -> CoreResult<()> {
        self.transaction(|| {
            let key = self.keys.item(&entity.id);
            if !options.create_if_missing && self.store.get(&key)?.is_none() {
                return Err(CoreError::EntityNotFound {
                    id: entity.id.clone(),
                });
            }
            self.store.put(&key, &encode(entity)?, PutOptions::default())?;
            if let Some(log) = &self.change_log {
                log.record_mutation(entity, Mutation::Put, options)?;
            }
            Ok(())
        })
    }

    /// Deletes an entity and logs the change. Returns `false` if it did not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns any storage or log error.
    pub fn delete(&self, id: &str, options: &WriteOptions) -> CoreResult<bool> {
        self.transaction(|| {
            let Some(existing) = self.get_by_id(id)? else {
                return Ok(false);
            };
            self.store.delete(&self.keys.item(id), DeleteOptions::default())?;
            if let Some(log) = &self.change_log {
                log.record_mutation(&existing, Mutation::Delete, options)?;
            }
            Ok(true)
        })
    }

    /// Returns every entity, in primary-key order.
    ///
    /// # Errors
    ///
    /// Returns an error if an entity cannot be decoded.
    pub fn entities(&self) -> CoreResult<Vec<Entity>> {
        self.store
            .get_range(&RangeQuery::prefix(self.keys.items()))?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect()
    }

    /// Registers a lifecycle listener. Dropped listeners are forgotten.
    pub fn add_listener(&self, listener: Weak<dyn LifecycleListener>) {
        self.listeners.write().push(listener);
    }

    /// Removes every key of this repository, including its identity and
    /// change log.
    ///
    /// Listeners receive [`LifecycleEvent::WillDestroy`] before anything is
    /// removed and [`LifecycleEvent::DidDestroy`] once removal committed.
    ///
    /// # Errors
    ///
    /// Returns an error if the keys cannot be removed. `DidDestroy` is not
    /// sent in that case.
    pub fn destroy(&self) -> CoreResult<()> {
        self.notify(LifecycleEvent::WillDestroy);
        let removed = self.transaction(|| {
            Ok(self
                .store
                .delete_range(&RangeQuery::prefix(self.keys.root()))?)
        })?;
        info!(repository = %self.name, removed, "destroyed repository");
        self.notify(LifecycleEvent::DidDestroy);
        Ok(())
    }

    fn notify(&self, event: LifecycleEvent) {
        let listeners: Vec<Arc<dyn LifecycleListener>> = {
            let mut listeners = self.listeners.write();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            listener.on_lifecycle(event);
        }
    }
}

impl EntityStore for Repository {
    type Error = CoreError;

    fn store_id(&self) -> CoreResult<String> {
        Repository::store_id(self)
    }

    fn get_by_id(&self, id: &str) -> CoreResult<Option<Entity>> {
        Repository::get_by_id(self, id)
    }

    fn save(&self, entity: &Entity, options: &WriteOptions) -> CoreResult<()> {
        Repository::save(self, entity, options)
    }

    fn delete(&self, id: &str, options: &WriteOptions) -> CoreResult<bool> {
        Repository::delete(self, id, options)
    }
}

//! Network-backed entity store.

use crate::connection::RemoteConnection;
use crate::error::{SyncError, SyncResult};
use replog_protocol::query::{encode_write_options, ID};
use replog_protocol::{Entity, EntityStore, Method, WriteOptions};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreIdBody {
    store_id: String,
}

#[derive(Deserialize)]
struct DeletedBody {
    deleted: bool,
}

/// Proxy to the entity routes of a remote store.
#[derive(Debug, Clone)]
pub struct RemoteRepository {
    connection: Arc<RemoteConnection>,
}

impl RemoteRepository {
    /// Creates a proxy over `connection`.
    pub fn new(connection: Arc<RemoteConnection>) -> Self {
        Self { connection }
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Arc<RemoteConnection> {
        &self.connection
    }

    fn item_query(id: &str, options: Option<&WriteOptions>) -> Vec<(String, String)> {
        let mut query = vec![(ID.to_string(), id.to_string())];
        if let Some(options) = options {
            query.extend(encode_write_options(options));
        }
        query
    }
}

impl EntityStore for RemoteRepository {
    type Error = SyncError;

    fn store_id(&self) -> SyncResult<String> {
        let body: StoreIdBody = self.connection.get_json("store", &[])?;
        Ok(body.store_id)
    }

    fn get_by_id(&self, id: &str) -> SyncResult<Option<Entity>> {
        match self.connection.get_json("items", &Self::item_query(id, None)) {
            Ok(entity) => Ok(Some(entity)),
            Err(SyncError::Transport { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn save(&self, entity: &Entity, options: &WriteOptions) -> SyncResult<()> {
        self.connection.send_json(
            Method::Put,
            "items",
            &Self::item_query(&entity.id, Some(options)),
            entity,
        )?;
        Ok(())
    }

    fn delete(&self, id: &str, options: &WriteOptions) -> SyncResult<bool> {
        let response = self.connection.send(
            Method::Delete,
            "items",
            &Self::item_query(id, Some(options)),
            None,
        )?;
        let body: DeletedBody = response.json()?;
        Ok(body.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::LoopbackClient;
    use replog_core::{ChangeLogConfig, Repository};
    use replog_server::{ServerConfig, StoreServer};

    fn remote() -> (Arc<Repository>, RemoteRepository) {
        let repository =
            Arc::new(Repository::in_memory("people").with_change_log(ChangeLogConfig::default()));
        let server = StoreServer::new(ServerConfig::default(), repository.clone());
        let client = Arc::new(LoopbackClient::new(server));
        let connection = RemoteConnection::new("http://hub", client).unwrap();
        (repository, RemoteRepository::new(Arc::new(connection)))
    }

    #[test]
    fn reports_remote_store_id() {
        let (repository, remote) = remote();
        assert_eq!(remote.store_id().unwrap(), repository.store_id().unwrap());
    }

    #[test]
    fn save_get_delete_round_trip() {
        let (repository, remote) = remote();
        let entity = Entity::new("people", "a/b c?").with_field("name", "Ada");

        assert_eq!(remote.get_by_id(&entity.id).unwrap(), None);
        remote.save(&entity, &WriteOptions::new()).unwrap();
        assert_eq!(repository.get_by_id(&entity.id).unwrap(), Some(entity.clone()));
        assert_eq!(remote.get_by_id(&entity.id).unwrap(), Some(entity.clone()));

        assert!(remote.delete(&entity.id, &WriteOptions::new()).unwrap());
        assert!(!remote.delete(&entity.id, &WriteOptions::new()).unwrap());
    }

    #[test]
    fn pushed_writes_keep_their_origin() {
        let (repository, remote) = remote();
        remote
            .save(&Entity::new("people", "p1"), &WriteOptions::replication_push("device"))
            .unwrap();

        let page = repository
            .change_log()
            .unwrap()
            .find_entries_after(0, &Default::default())
            .unwrap();
        assert_eq!(page.items[0].origin_store_id, "device");
    }

    #[test]
    fn update_only_save_of_missing_entity_fails() {
        let (_, remote) = remote();
        let err = remote
            .save(&Entity::new("people", "p1"), &WriteOptions::new().update_only())
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}

//! Repositories, servers and synchronizers wired together in process.

use replog_core::{ChangeLogConfig, Repository};
use replog_engine::{
    HttpClient, LoopbackClient, SyncResult, SyncStats, Synchronizer, SynchronizerConfig,
};
use replog_protocol::{Entity, FindOptions, LogEntry, WriteOptions};
use replog_server::{ServerConfig, StoreServer};
use std::sync::Arc;
use std::time::Duration;

/// Collection used by the fixture entities.
pub const PEOPLE: &str = "people";

/// Returns a person entity.
pub fn person(id: &str, name: &str) -> Entity {
    Entity::new(PEOPLE, id).with_field("name", name)
}

/// Returns the `name` field of an entity.
pub fn name_of(entity: &Entity) -> Option<&str> {
    entity.get("name").and_then(|name| name.as_str())
}

/// Creates an in-memory repository with a change log.
pub fn logged_repository(name: &str) -> Arc<Repository> {
    Arc::new(Repository::in_memory(name).with_change_log(ChangeLogConfig::default()))
}

/// Returns the pending entries of a repository's change log.
pub fn pending_entries(repository: &Repository) -> Vec<LogEntry> {
    repository
        .change_log()
        .expect("repository has no change log")
        .find_entries_after(0, &FindOptions::new())
        .expect("Failed to read change log")
        .items
}

/// A logged repository served in process.
#[derive(Clone)]
pub struct LoopbackPeer {
    /// The served repository.
    pub repository: Arc<Repository>,
    /// The server in front of it.
    pub server: Arc<StoreServer>,
    /// A client routing requests to the server.
    pub client: Arc<LoopbackClient<Arc<StoreServer>>>,
    url: String,
}

impl LoopbackPeer {
    /// Serves a new repository named `name` without authorization.
    pub fn new(name: &str) -> Self {
        Self::with_config(name, ServerConfig::new().with_base_path(format!("/{name}")))
    }

    /// Serves a new repository named `name` with `config`.
    pub fn with_config(name: &str, config: ServerConfig) -> Self {
        Self::serve(logged_repository(name), config)
    }

    /// Serves an existing repository.
    pub fn serve(repository: Arc<Repository>, config: ServerConfig) -> Self {
        let url = format!("http://{}.test{}", repository.name(), config.base_path);
        let server = Arc::new(StoreServer::new(config, Arc::clone(&repository)));
        let client = Arc::new(LoopbackClient::new(Arc::clone(&server)));
        Self {
            repository,
            server,
            client,
            url,
        }
    }

    /// Returns the URL the repository is served under.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Makes the peer unreachable, or reachable again.
    pub fn set_offline(&self, offline: bool) {
        self.client.set_offline(offline);
    }

    /// Saves an entity as an application write.
    pub fn save(&self, entity: Entity) {
        self.repository
            .save(&entity, &WriteOptions::new())
            .expect("Failed to save entity");
    }

    /// Deletes an entity as an application write.
    pub fn delete(&self, id: &str) -> bool {
        self.repository
            .delete(id, &WriteOptions::new())
            .expect("Failed to delete entity")
    }

    /// Reads an entity.
    pub fn get(&self, id: &str) -> Option<Entity> {
        self.repository.get_by_id(id).expect("Failed to read entity")
    }
}

/// Configuration used by fixtures: no authorization, fast polling.
pub fn test_config() -> SynchronizerConfig {
    SynchronizerConfig::new()
        .with_authorization_required(false)
        .with_poll_interval(Duration::from_millis(5))
}

/// A local repository synchronized with a [`LoopbackPeer`].
pub struct ReplicatedPair {
    /// The local side, wrapped as a peer for its helpers.
    pub local: LoopbackPeer,
    /// The remote side.
    pub remote: LoopbackPeer,
    /// The synchronizer, local to `local`.
    pub sync: Arc<Synchronizer>,
}

impl ReplicatedPair {
    /// Creates an empty pair with [`test_config`].
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Creates an empty pair with `config`.
    pub fn with_config(config: SynchronizerConfig) -> Self {
        Self::attach(&LoopbackPeer::new("hub"), "device", config)
    }

    /// Creates a new local repository named `local_name` synchronized with
    /// an existing peer. Several pairs may share one peer.
    pub fn attach(remote: &LoopbackPeer, local_name: &str, config: SynchronizerConfig) -> Self {
        let local = LoopbackPeer::new(local_name);
        let client: Arc<dyn HttpClient> = remote.client.clone();
        let sync = Synchronizer::new(Arc::clone(&local.repository), remote.url(), client, config)
            .expect("Failed to create synchronizer");
        Self {
            local,
            remote: remote.clone(),
            sync,
        }
    }

    /// Runs one pass.
    pub fn try_run(&self) -> SyncResult<SyncStats> {
        self.sync.run(false)
    }

    /// Runs one pass that must succeed.
    pub fn run(&self) -> SyncStats {
        self.try_run().expect("Synchronization pass failed")
    }

    /// Returns `true` when both sides hold the same entities.
    pub fn is_converged(&self) -> bool {
        let local = self.local.repository.entities().expect("Failed to list local entities");
        let remote = self.remote.repository.entities().expect("Failed to list remote entities");
        local == remote
    }
}

impl Default for ReplicatedPair {
    fn default() -> Self {
        Self::new()
    }
}

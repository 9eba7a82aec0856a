//! The synchronizer: pull remote changes, push local ones.
//!
//! ## Pass
//!
//! One pass runs, in order:
//! 1. **Initialize**: resolve and persist the peer identity and the peer
//!    cursor (once per synchronizer, and again after the local store is
//!    destroyed).
//! 2. **Pull**: read the peer log after the peer cursor, skipping entries
//!    that originated here, and apply each change locally as a
//!    [`ReplicationApply`](replog_protocol::WriteSource::ReplicationApply)
//!    write. Then persist the peer cursor.
//! 3. **Push**: read the whole local log, apply each change to the peer as
//!    a [`ReplicationPush`](replog_protocol::WriteSource::ReplicationPush)
//!    write and truncate the local log up to what was read.
//!
//! A failing step leaves every cursor at the last completed step, so the
//! next pass retries the same entries.
//!
//! ## States
//!
//! ```text
//! Idle ──run──► Running ──► Idle
//!   │                         ▲
//!   └─suspend─► Suspended ─resume
//! ```
//!
//! The background loop ([`Synchronizer::start`]) runs a quiet pass every
//! [`loop_interval`](crate::SynchronizerConfig::loop_interval) until
//! [`Synchronizer::stop`] is called.

use crate::config::SynchronizerConfig;
use crate::connection::RemoteConnection;
use crate::connectivity::{Connectivity, PingConnectivity};
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, Progress, ProgressTask, SyncEvent};
use crate::http::HttpClient;
use crate::remote_log::RemoteLogClient;
use crate::remote_repository::RemoteRepository;
use parking_lot::{Condvar, Mutex, RwLock};
use replog_core::{ChangeLog, CoreError, LifecycleEvent, LifecycleListener, Repository};
use replog_protocol::{Entity, EntityStore, FindOptions, LogEntry, LogFilter, WriteOptions};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info, warn};

/// Counters of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Entities pulled and saved locally.
    pub updated_local: u64,
    /// Entities pulled as deleted and removed locally.
    pub deleted_local: u64,
    /// Entities pushed and saved remotely.
    pub updated_remote: u64,
    /// Entities pushed as deleted and removed remotely.
    pub deleted_remote: u64,
}

impl SyncStats {
    /// Returns `true` when the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Observable state of a synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass in progress.
    Idle,
    /// A pass is in progress.
    Running,
    /// Passes are no-ops until resumed.
    Suspended,
    /// The loop was asked to stop and has not ended yet.
    Stopping,
}

#[derive(Debug, Default)]
struct Flags {
    started: bool,
    stopping: bool,
    running: bool,
    suspended: bool,
    initialized: bool,
}

/// Peer state cached from the store record.
#[derive(Debug, Default)]
struct PeerCache {
    store_id: Option<String>,
    last_seen_sequence: Option<u64>,
}

/// Replicates a local repository with a remote store.
///
/// # Example
///
/// ```
/// use replog_core::{ChangeLogConfig, Repository};
/// use replog_engine::{LoopbackClient, Synchronizer, SynchronizerConfig};
/// use replog_protocol::{Entity, WriteOptions};
/// use replog_server::{ServerConfig, StoreServer};
/// use std::sync::Arc;
///
/// let hub = Arc::new(Repository::in_memory("hub").with_change_log(ChangeLogConfig::default()));
/// let server = StoreServer::new(ServerConfig::default(), hub.clone());
///
/// let local = Repository::in_memory("device").with_change_log(ChangeLogConfig::default());
/// let local = Arc::new(local);
/// let sync = Synchronizer::new(
///     local.clone(),
///     "http://hub.local",
///     Arc::new(LoopbackClient::new(server)),
///     SynchronizerConfig::new().with_authorization_required(false),
/// )
/// .unwrap();
///
/// local.save(&Entity::new("people", "p1"), &WriteOptions::new()).unwrap();
/// let stats = sync.run(false).unwrap();
/// assert_eq!(stats.updated_remote, 1);
/// assert!(hub.get_by_id("p1").unwrap().is_some());
/// ```
pub struct Synchronizer {
    config: SynchronizerConfig,
    filter: RwLock<Option<LogFilter>>,
    local: Arc<Repository>,
    connection: Arc<RemoteConnection>,
    remote: RemoteRepository,
    remote_log: RemoteLogClient,
    connectivity: Arc<dyn Connectivity>,
    events: EventBus,
    flags: Mutex<Flags>,
    stop_signal: Condvar,
    peer: Mutex<PeerCache>,
    last_synchronization: Mutex<Option<SystemTime>>,
    loop_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Synchronizer {
    /// Creates a synchronizer between `local` and the store served under
    /// `remote_url`, probing connectivity with `GET ping`.
    ///
    /// The synchronizer registers itself as a lifecycle listener of
    /// `local`.
    ///
    /// # Errors
    ///
    /// Returns an error if `local` has no change log or `remote_url` is
    /// malformed.
    pub fn new(
        local: Arc<Repository>,
        remote_url: &str,
        client: Arc<dyn HttpClient>,
        config: SynchronizerConfig,
    ) -> SyncResult<Arc<Self>> {
        let connection = Arc::new(
            RemoteConnection::new(remote_url, client)?.with_timeout(config.request_timeout),
        );
        let connectivity = Arc::new(PingConnectivity::new(Arc::clone(&connection)));
        Self::with_connectivity(local, connection, connectivity, config)
    }

    /// Creates a synchronizer over an existing connection and prober.
    ///
    /// # Errors
    ///
    /// Returns an error if `local` has no change log.
    pub fn with_connectivity(
        local: Arc<Repository>,
        connection: Arc<RemoteConnection>,
        connectivity: Arc<dyn Connectivity>,
        config: SynchronizerConfig,
    ) -> SyncResult<Arc<Self>> {
        if local.change_log().is_none() {
            return Err(CoreError::precondition(format!(
                "repository '{}' has no change log",
                local.name()
            ))
            .into());
        }

        let synchronizer = Arc::new(Self {
            filter: RwLock::new(config.filter.clone()),
            config,
            remote: RemoteRepository::new(Arc::clone(&connection)),
            remote_log: RemoteLogClient::new(Arc::clone(&connection)),
            connection,
            connectivity,
            local,
            events: EventBus::new(),
            flags: Mutex::new(Flags::default()),
            stop_signal: Condvar::new(),
            peer: Mutex::new(PeerCache::default()),
            last_synchronization: Mutex::new(None),
            loop_thread: Mutex::new(None),
        });

        let listener = Arc::downgrade(&synchronizer);
        let listener: Weak<dyn LifecycleListener> = listener;
        synchronizer.local.add_listener(listener);
        Ok(synchronizer)
    }

    /// Returns the local repository.
    pub fn local(&self) -> &Arc<Repository> {
        &self.local
    }

    /// Returns the remote connection. Set the authorization token here.
    pub fn connection(&self) -> &Arc<RemoteConnection> {
        &self.connection
    }

    /// Returns the remote entity proxy.
    pub fn remote(&self) -> &RemoteRepository {
        &self.remote
    }

    /// Returns the connectivity prober.
    pub fn connectivity(&self) -> &Arc<dyn Connectivity> {
        &self.connectivity
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SynchronizerConfig {
        &self.config
    }

    /// Subscribes to notifications.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Returns the pull filter.
    pub fn filter(&self) -> Option<LogFilter> {
        self.filter.read().clone()
    }

    /// Replaces the pull filter. Takes effect on the next pass.
    pub fn set_filter(&self, filter: Option<LogFilter>) {
        *self.filter.write() = filter;
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        let flags = self.flags.lock();
        if flags.running {
            SyncState::Running
        } else if flags.suspended {
            SyncState::Suspended
        } else if flags.stopping {
            SyncState::Stopping
        } else {
            SyncState::Idle
        }
    }

    /// Returns `true` while the background loop runs.
    pub fn is_started(&self) -> bool {
        self.flags.lock().started
    }

    /// Returns `true` while a pass is in progress.
    pub fn is_running(&self) -> bool {
        self.flags.lock().running
    }

    /// Returns `true` while suspended.
    pub fn is_suspended(&self) -> bool {
        self.flags.lock().suspended
    }

    /// Returns when the last pass completed.
    pub fn last_synchronization(&self) -> Option<SystemTime> {
        *self.last_synchronization.lock()
    }

    /// Returns the persisted peer identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the store record cannot be read.
    pub fn peer_store_id(&self) -> SyncResult<Option<String>> {
        if let Some(id) = &self.peer.lock().store_id {
            return Ok(Some(id.clone()));
        }
        let id = self.local.load_record()?.peer_store_id;
        if id.is_some() {
            self.peer.lock().store_id.clone_from(&id);
        }
        Ok(id)
    }

    /// Returns the persisted cursor into the peer log.
    ///
    /// # Errors
    ///
    /// Returns an error if the store record cannot be read.
    pub fn peer_last_seen_sequence(&self) -> SyncResult<Option<u64>> {
        if let Some(sequence) = self.peer.lock().last_seen_sequence {
            return Ok(Some(sequence));
        }
        let sequence = self.local.load_record()?.peer_last_seen_sequence;
        if sequence.is_some() {
            self.peer.lock().last_seen_sequence = sequence;
        }
        Ok(sequence)
    }

    fn set_peer_store_id(&self, id: &str) -> SyncResult<()> {
        self.local
            .update_record(|record| record.peer_store_id = Some(id.to_string()))?;
        self.peer.lock().store_id = Some(id.to_string());
        Ok(())
    }

    /// Moves the peer cursor forward. A lower sequence is ignored.
    fn set_peer_last_seen_sequence(&self, sequence: u64) -> SyncResult<()> {
        match self.peer_last_seen_sequence()? {
            Some(current) if current == sequence => return Ok(()),
            Some(current) if current > sequence => {
                warn!(current, reported = sequence, "Peer cursor went backwards, keeping it");
                return Ok(());
            }
            _ => {}
        }
        self.local
            .update_record(|record| record.peer_last_seen_sequence = Some(sequence))?;
        self.peer.lock().last_seen_sequence = Some(sequence);
        Ok(())
    }

    /// Resolves and persists the peer identity and cursor. Does nothing
    /// once initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote identity cannot be fetched or the
    /// store record cannot be written.
    pub fn initialize(&self) -> SyncResult<()> {
        if self.flags.lock().initialized {
            return Ok(());
        }

        let peer = match self.peer_store_id()? {
            Some(peer) => peer,
            None => {
                let peer = self.remote.store_id()?;
                self.set_peer_store_id(&peer)?;
                peer
            }
        };
        if self.peer_last_seen_sequence()?.is_none() {
            self.set_peer_last_seen_sequence(0)?;
        }

        self.flags.lock().initialized = true;
        debug!(store = %self.local.name(), %peer, "Synchronizer initialized");
        self.events.emit(SyncEvent::DidInitialize);
        Ok(())
    }

    /// Runs one pass. Returns zeroed counters without doing anything when
    /// another pass is running, when suspended, or when authorization,
    /// filter or connectivity is missing. In `quiet` mode the reason is
    /// not logged.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the pass, after emitting
    /// [`SyncEvent::DidFail`].
    pub fn run(&self, quiet: bool) -> SyncResult<SyncStats> {
        if !self.can_run() {
            return Ok(SyncStats::default());
        }
        if self.config.authorization_is_required && !self.connection.has_token() {
            if !quiet {
                info!("an authorization is required to run the synchronizer");
            }
            return Ok(SyncStats::default());
        }
        if self.config.filter_is_required && self.filter.read().is_none() {
            if !quiet {
                info!("a filter is required to run the synchronizer");
            }
            return Ok(SyncStats::default());
        }
        if self.connectivity.is_offline().is_none() {
            self.connectivity.probe();
        }
        if self.connectivity.is_offline() == Some(true) {
            if !quiet {
                info!("a working connection is required to run the synchronizer");
            }
            return Ok(SyncStats::default());
        }

        {
            let mut flags = self.flags.lock();
            if flags.running || flags.suspended {
                return Ok(SyncStats::default());
            }
            flags.running = true;
        }
        let result = self.run_pass();
        self.flags.lock().running = false;

        result.inspect_err(|err| {
            self.events.emit(SyncEvent::DidFail {
                message: err.to_string(),
            });
        })
    }

    fn can_run(&self) -> bool {
        let flags = self.flags.lock();
        !flags.running && !flags.suspended
    }

    fn run_pass(&self) -> SyncResult<SyncStats> {
        let is_first_sync = self.peer_store_id()?.is_none();
        self.events.emit(SyncEvent::WillRun { is_first_sync });

        self.initialize()?;
        let (updated_local, deleted_local) = self.pull()?;
        let (updated_remote, deleted_remote) = self.push()?;

        let stats = SyncStats {
            updated_local,
            deleted_local,
            updated_remote,
            deleted_remote,
        };
        *self.last_synchronization.lock() = Some(SystemTime::now());
        info!(
            store = %self.local.name(),
            updated_local,
            deleted_local,
            updated_remote,
            deleted_remote,
            "Synchronization pass completed"
        );
        self.events.emit(SyncEvent::DidRun(stats));
        Ok(stats)
    }

    fn local_log(&self) -> SyncResult<&ChangeLog> {
        self.local.change_log().ok_or_else(|| {
            SyncError::from(CoreError::precondition(format!(
                "repository '{}' has no change log",
                self.local.name()
            )))
        })
    }

    fn progress(&self, progress: Progress) {
        self.events.emit(SyncEvent::DidProgress(progress));
    }

    fn throttle(&self) {
        if let Some(delay) = self.config.throttling {
            thread::sleep(delay);
        }
    }

    fn split(entries: &[LogEntry]) -> (Vec<&LogEntry>, Vec<&LogEntry>) {
        entries.iter().partition(|entry| !entry.is_deleted)
    }

    /// Pulls remote changes into the local store.
    fn pull(&self) -> SyncResult<(u64, u64)> {
        let last_seen = self.peer_last_seen_sequence()?.unwrap_or(0);
        let mut options = FindOptions::new().ignoring_origin(self.local.store_id()?);
        if let Some(filter) = self.filter() {
            options = options.with_filter(filter);
        }

        self.progress(Progress::task(ProgressTask::ReceivingRemoteLog));
        let page = self.remote_log.find_entries_after(last_seen, &options)?;

        let expected = self.peer_store_id()?.unwrap_or_default();
        if page.store_id != expected {
            warn!(expected = %expected, actual = %page.store_id, "Remote store identity changed");
            self.events.emit(SyncEvent::RemotePeerIdentityChanged {
                expected: expected.clone(),
                actual: page.store_id.clone(),
            });
            return Err(SyncError::IdentityMismatch {
                expected,
                actual: page.store_id,
            });
        }

        let (updates, deletions) = Self::split(&page.items);

        self.progress(Progress::task(ProgressTask::ReceivingRemoteItems));
        let mut remote_items: Vec<(Entity, &str)> = Vec::with_capacity(updates.len());
        for entry in updates {
            match self.remote.get_by_id(&entry.primary_key)? {
                Some(entity) => remote_items.push((entity, &entry.origin_store_id)),
                None => {
                    debug!(primary_key = %entry.primary_key, "Remote entity vanished before pull");
                }
            }
        }

        let mut updated = 0;
        for (done, (entity, origin)) in remote_items.iter().enumerate() {
            self.throttle();
            self.progress(Progress::counted(
                ProgressTask::SavingItemsInLocalStore,
                done,
                remote_items.len(),
            ));
            self.local
                .save(entity, &WriteOptions::replication_apply(*origin))?;
            updated += 1;
        }

        let mut deleted = 0;
        for (done, entry) in deletions.iter().enumerate() {
            self.throttle();
            self.progress(Progress::counted(
                ProgressTask::DeletingItemsInLocalStore,
                done,
                deletions.len(),
            ));
            let options = WriteOptions::replication_apply(entry.origin_store_id.as_str());
            if self.local.delete(&entry.primary_key, &options)? {
                deleted += 1;
            }
        }

        self.set_peer_last_seen_sequence(page.last_log_sequence)?;
        Ok((updated, deleted))
    }

    /// Pushes local changes to the remote store, then truncates the local
    /// log.
    fn push(&self) -> SyncResult<(u64, u64)> {
        let log = self.local_log()?;
        self.progress(Progress::task(ProgressTask::LoadingLocalLog));
        let page = log.find_entries_after(0, &FindOptions::new())?;
        let options = WriteOptions::replication_push(page.store_id.as_str());

        let (updates, deletions) = Self::split(&page.items);

        self.progress(Progress::task(ProgressTask::LoadingLocalItems));
        let mut local_items = Vec::with_capacity(updates.len());
        for entry in updates {
            if let Some(entity) = self.local.get_by_id(&entry.primary_key)? {
                local_items.push(entity);
            }
        }

        let mut updated = 0;
        for (done, entity) in local_items.iter().enumerate() {
            self.throttle();
            self.progress(Progress::counted(
                ProgressTask::SavingItemsInRemoteStore,
                done,
                local_items.len(),
            ));
            self.remote.save(entity, &options)?;
            updated += 1;
        }

        let mut deleted = 0;
        for (done, entry) in deletions.iter().enumerate() {
            self.throttle();
            self.progress(Progress::counted(
                ProgressTask::DeletingItemsInRemoteStore,
                done,
                deletions.len(),
            ));
            if self.remote.delete(&entry.primary_key, &options)? {
                deleted += 1;
            }
        }

        let removed = log.truncate_up_to(page.last_log_sequence)?;
        debug!(
            store = %page.store_id,
            sequence = page.last_log_sequence,
            removed,
            "Truncated pushed entries"
        );
        Ok((updated, deleted))
    }

    /// Starts the background loop. Does nothing if it already runs.
    pub fn start(self: &Arc<Self>) {
        {
            let mut flags = self.flags.lock();
            if flags.started {
                return;
            }
            flags.started = true;
            flags.stopping = false;
        }

        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("replog-sync".into())
            .spawn(move || this.run_loop());
        match spawned {
            Ok(handle) => *self.loop_thread.lock() = Some(handle),
            Err(err) => {
                error!(error = %err, "Failed to spawn synchronizer loop");
                self.flags.lock().started = false;
            }
        }
    }

    fn run_loop(&self) {
        self.events.emit(SyncEvent::DidStart);
        info!(store = %self.local.name(), "Synchronizer started");

        while !self.flags.lock().stopping {
            if let Err(err) = self.run(true) {
                error!(store = %self.local.name(), error = %err, "Synchronization pass failed");
            }

            let deadline = Instant::now() + self.config.loop_interval;
            let mut flags = self.flags.lock();
            while !flags.stopping {
                if self.stop_signal.wait_until(&mut flags, deadline).timed_out() {
                    break;
                }
            }
        }

        {
            let mut flags = self.flags.lock();
            flags.started = false;
            flags.stopping = false;
        }
        info!(store = %self.local.name(), "Synchronizer stopped");
        self.events.emit(SyncEvent::DidStop);
    }

    /// Asks the background loop to stop after the current pass. Does not
    /// block.
    pub fn stop(&self) {
        {
            let mut flags = self.flags.lock();
            if !flags.started || flags.stopping {
                return;
            }
            flags.stopping = true;
            // Sent before the loop can observe the flag, so WillStop precedes DidStop.
            self.events.emit(SyncEvent::WillStop);
        }
        self.stop_signal.notify_all();
    }

    /// Blocks until the background loop and any pass have ended.
    pub fn wait_until_stopped(&self) {
        loop {
            {
                let flags = self.flags.lock();
                if !flags.started && !flags.running {
                    break;
                }
            }
            thread::sleep(self.config.poll_interval);
        }
        let handle = self.loop_thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Synchronizer loop panicked");
            }
        }
    }

    /// Makes passes no-ops and blocks until the current pass has ended.
    pub fn suspend(&self) {
        self.flags.lock().suspended = true;
        while self.is_running() {
            thread::sleep(self.config.poll_interval);
        }
    }

    /// Lets passes run again.
    pub fn resume(&self) {
        self.flags.lock().suspended = false;
    }
}

impl LifecycleListener for Synchronizer {
    fn on_lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::WillDestroy => self.suspend(),
            LifecycleEvent::DidDestroy => {
                self.flags.lock().initialized = false;
                *self.peer.lock() = PeerCache::default();
                self.resume();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::LoopbackClient;
    use replog_core::ChangeLogConfig;
    use replog_protocol::PRIMARY_KEY_FIELD;
    use replog_server::{ServerConfig, StoreServer};
    use std::time::Duration;

    struct Fixture {
        local: Arc<Repository>,
        remote: Arc<Repository>,
        client: Arc<LoopbackClient<StoreServer>>,
        sync: Arc<Synchronizer>,
    }

    fn logged(name: &str) -> Arc<Repository> {
        Arc::new(Repository::in_memory(name).with_change_log(ChangeLogConfig::default()))
    }

    fn fixture(config: SynchronizerConfig) -> Fixture {
        let local = logged("device");
        let remote = logged("hub");
        let client = Arc::new(LoopbackClient::new(StoreServer::new(
            ServerConfig::default(),
            remote.clone(),
        )));
        let sync = Synchronizer::new(local.clone(), "http://hub", client.clone(), config).unwrap();
        Fixture {
            local,
            remote,
            client,
            sync,
        }
    }

    fn open_config() -> SynchronizerConfig {
        SynchronizerConfig::new()
            .with_authorization_required(false)
            .with_poll_interval(Duration::from_millis(5))
    }

    #[test]
    fn requires_a_local_change_log() {
        let client: Arc<dyn HttpClient> =
            Arc::new(LoopbackClient::new(StoreServer::new(ServerConfig::default(), logged("hub"))));
        let result = Synchronizer::new(
            Arc::new(Repository::in_memory("plain")),
            "http://hub",
            client,
            open_config(),
        );
        assert!(matches!(
            result.err(),
            Some(SyncError::Core(CoreError::Precondition { .. }))
        ));
    }

    #[test]
    fn initialize_persists_peer_state() {
        let f = fixture(open_config());
        assert_eq!(f.sync.peer_store_id().unwrap(), None);

        let events = f.sync.subscribe();
        f.sync.initialize().unwrap();
        f.sync.initialize().unwrap();

        let record = f.local.load_record().unwrap();
        assert_eq!(record.peer_store_id, Some(f.remote.store_id().unwrap()));
        assert_eq!(record.peer_last_seen_sequence, Some(0));
        assert_eq!(events.try_iter().filter(|e| *e == SyncEvent::DidInitialize).count(), 1);
    }

    #[test]
    fn missing_authorization_skips_the_pass() {
        let f = fixture(SynchronizerConfig::new());
        f.local
            .save(&Entity::new("people", "p1"), &WriteOptions::new())
            .unwrap();

        assert!(f.sync.run(false).unwrap().is_empty());
        assert_eq!(f.remote.get_by_id("p1").unwrap(), None);

        f.sync.connection().set_token(Some("token".into()));
        assert_eq!(f.sync.run(false).unwrap().updated_remote, 1);
    }

    #[test]
    fn missing_filter_skips_the_pass() {
        let f = fixture(open_config().with_filter_required(true));
        f.remote
            .save(&Entity::new("people", "p1"), &WriteOptions::new())
            .unwrap();
        assert!(f.sync.run(false).unwrap().is_empty());

        f.sync.set_filter(Some(LogFilter::field(PRIMARY_KEY_FIELD, "p1")));
        assert_eq!(f.sync.run(false).unwrap().updated_local, 1);
    }

    #[test]
    fn offline_peer_skips_the_pass() {
        let f = fixture(open_config());
        f.client.set_offline(true);
        f.local
            .save(&Entity::new("people", "p1"), &WriteOptions::new())
            .unwrap();

        assert!(f.sync.run(true).unwrap().is_empty());
        assert_eq!(f.sync.connectivity().is_offline(), Some(true));

        f.client.set_offline(false);
        assert!(f.sync.run(true).unwrap().is_empty());

        f.sync.connectivity().set_offline(None);
        assert_eq!(f.sync.run(true).unwrap().updated_remote, 1);
    }

    #[test]
    fn failed_pass_keeps_the_local_log() {
        let f = fixture(open_config());
        f.sync.run(false).unwrap();
        f.local
            .save(&Entity::new("people", "p1"), &WriteOptions::new())
            .unwrap();

        let events = f.sync.subscribe();
        f.client.set_offline(true);
        let err = f.sync.run(false).unwrap_err();
        assert!(matches!(err, SyncError::Connection(_)));
        assert!(!f.sync.is_running());
        assert!(events
            .try_iter()
            .any(|e| matches!(e, SyncEvent::DidFail { .. })));

        let log = f.local.change_log().unwrap();
        assert_eq!(log.find_entries_after(0, &FindOptions::new()).unwrap().items.len(), 1);

        f.client.set_offline(false);
        assert_eq!(f.sync.run(false).unwrap().updated_remote, 1);
        assert!(log.find_entries_after(0, &FindOptions::new()).unwrap().items.is_empty());
    }

    #[test]
    fn progress_is_reported() {
        let f = fixture(open_config());
        f.remote
            .save(&Entity::new("people", "p1"), &WriteOptions::new())
            .unwrap();
        let events = f.sync.subscribe();
        f.sync.run(false).unwrap();

        let tasks: Vec<ProgressTask> = events
            .try_iter()
            .filter_map(|e| match e {
                SyncEvent::DidProgress(progress) => Some(progress.task),
                _ => None,
            })
            .collect();
        assert_eq!(
            tasks,
            [
                ProgressTask::ReceivingRemoteLog,
                ProgressTask::ReceivingRemoteItems,
                ProgressTask::SavingItemsInLocalStore,
                ProgressTask::LoadingLocalLog,
                ProgressTask::LoadingLocalItems,
            ]
        );
    }

    #[test]
    fn suspended_passes_are_noops() {
        let f = fixture(open_config());
        f.local
            .save(&Entity::new("people", "p1"), &WriteOptions::new())
            .unwrap();

        f.sync.suspend();
        assert_eq!(f.sync.state(), SyncState::Suspended);
        assert!(f.sync.run(false).unwrap().is_empty());

        f.sync.resume();
        assert_eq!(f.sync.state(), SyncState::Idle);
        assert_eq!(f.sync.run(false).unwrap().updated_remote, 1);
    }

    #[test]
    fn local_destroy_resets_peer_state() {
        let f = fixture(open_config());
        f.sync.run(false).unwrap();
        assert!(f.sync.peer_store_id().unwrap().is_some());

        f.local.destroy().unwrap();
        assert!(!f.sync.is_suspended());
        assert_eq!(f.sync.peer_store_id().unwrap(), None);

        let events = f.sync.subscribe();
        f.sync.run(false).unwrap();
        assert!(events
            .try_iter()
            .any(|e| e == SyncEvent::WillRun { is_first_sync: true }));
    }

    #[test]
    fn peer_cursor_never_moves_back() {
        let f = fixture(open_config());
        let hub_id = f.remote.store_id().unwrap();
        f.local
            .update_record(|record| {
                record.peer_store_id = Some(hub_id);
                record.peer_last_seen_sequence = Some(99);
            })
            .unwrap();
        f.remote
            .save(&Entity::new("people", "p1"), &WriteOptions::new())
            .unwrap();

        assert!(f.sync.run(false).unwrap().is_empty());
        assert_eq!(f.sync.peer_last_seen_sequence().unwrap(), Some(99));
        assert_eq!(f.local.load_record().unwrap().peer_last_seen_sequence, Some(99));
    }

    #[test]
    fn loop_runs_until_stopped() {
        let f = fixture(open_config().with_loop_interval(Duration::from_secs(3600)));
        let events = f.sync.subscribe();
        f.local
            .save(&Entity::new("people", "p1"), &WriteOptions::new())
            .unwrap();

        f.sync.start();
        f.sync.start();
        assert_eq!(events.recv_timeout(Duration::from_secs(5)).unwrap(), SyncEvent::DidStart);
        loop {
            if let SyncEvent::DidRun(_) = events.recv_timeout(Duration::from_secs(5)).unwrap() {
                break;
            }
        }
        assert!(f.sync.is_started());

        f.sync.stop();
        f.sync.wait_until_stopped();
        assert!(!f.sync.is_started());
        assert!(f.remote.get_by_id("p1").unwrap().is_some());

        let rest: Vec<SyncEvent> = events.try_iter().collect();
        assert_eq!(rest, [SyncEvent::WillStop, SyncEvent::DidStop]);
    }

    #[test]
    fn loopback_service_sees_bearer_token() {
        let f = fixture(SynchronizerConfig::new());
        f.sync.connection().set_token(Some("secret-token".into()));
        f.sync.run(false).unwrap();
        let request = f.client.last_request().unwrap();
        assert_eq!(request.bearer_token(), Some("secret-token"));
    }
}

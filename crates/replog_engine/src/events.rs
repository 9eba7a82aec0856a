//! Synchronizer notifications.
//!
//! Subscribers receive every [`SyncEvent`] emitted after they subscribed,
//! in emission order, on an `mpsc` channel. Dropped receivers are pruned
//! on the next emission.

use crate::synchronizer::SyncStats;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// Step of a pass reported through [`SyncEvent::DidProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressTask {
    /// Fetching the remote log.
    ReceivingRemoteLog,
    /// Fetching the remote entities named by the log.
    ReceivingRemoteItems,
    /// Applying pulled entities.
    SavingItemsInLocalStore,
    /// Applying pulled deletions.
    DeletingItemsInLocalStore,
    /// Reading the local log.
    LoadingLocalLog,
    /// Reading the local entities named by the log.
    LoadingLocalItems,
    /// Pushing entities.
    SavingItemsInRemoteStore,
    /// Pushing deletions.
    DeletingItemsInRemoteStore,
}

/// Progress of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Current step.
    pub task: ProgressTask,
    /// Share of the step already done, in `0.0..1.0`, when it is countable.
    pub fraction: Option<f64>,
}

impl Progress {
    /// Progress of an uncountable step.
    pub fn task(task: ProgressTask) -> Self {
        Self {
            task,
            fraction: None,
        }
    }

    /// Progress of item `done` out of `total`.
    pub fn counted(task: ProgressTask, done: usize, total: usize) -> Self {
        let fraction = if total == 0 {
            0.0
        } else {
            done as f64 / total as f64
        };
        Self {
            task,
            fraction: Some(fraction),
        }
    }
}

/// A synchronizer notification.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Peer identity and cursor are resolved.
    DidInitialize,
    /// The background loop started.
    DidStart,
    /// The background loop was asked to stop.
    WillStop,
    /// The background loop ended.
    DidStop,
    /// A pass is starting.
    WillRun {
        /// No peer identity was known before this pass.
        is_first_sync: bool,
    },
    /// A pass completed.
    DidRun(SyncStats),
    /// A pass failed.
    DidFail {
        /// Error text.
        message: String,
    },
    /// A pass made progress.
    DidProgress(Progress),
    /// The remote reports another identity than the persisted peer.
    RemotePeerIdentityChanged {
        /// Persisted peer identity.
        expected: String,
        /// Identity reported by the remote.
        actual: String,
    },
}

/// Distributes events to subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Sender<SyncEvent>>>,
}

impl EventBus {
    /// Creates a bus without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver of every future event.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Sends `event` to every live subscriber.
    pub fn emit(&self, event: SyncEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

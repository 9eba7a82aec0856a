//! # replog Engine
//!
//! Replicates a local repository with a remote store.
//!
//! This crate provides:
//! - [`Synchronizer`]: the pull-then-push pass, the background loop and
//!   the suspend/resume controls
//! - [`RemoteLogClient`]: the remote side of the change-log read contract
//! - [`RemoteRepository`]: entity writes against the remote store
//! - [`HttpClient`]: the transport abstraction, with an in-process
//!   [`LoopbackClient`]
//! - [`Connectivity`]: reachability of the remote store
//! - [`EventBus`]: notifications of passes and loop lifecycle
//!
//! ## Architecture
//!
//! A pass pulls first and pushes second:
//! 1. Pull the remote entries the local store has not seen, skipping those
//!    that originated locally, and apply them without logging them again
//! 2. Push every pending local entry and truncate the local log
//!
//! A pulled change retires the local pending entry of the same entity, so
//! when both sides changed an entity between two passes, the remote value
//! is kept.
//!
//! ## Key Invariants
//!
//! - Pull always happens before push
//! - Applied changes never re-enter the log of the receiving store
//! - The peer cursor only advances after a complete pull
//! - The local log is only truncated after a complete push
//! - A changed remote identity aborts the pass

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod connectivity;
mod error;
mod events;
mod http;
mod remote_log;
mod remote_repository;
mod synchronizer;

pub use config::SynchronizerConfig;
pub use connection::RemoteConnection;
pub use connectivity::{Connectivity, PingConnectivity};
pub use error::{SyncError, SyncResult};
pub use events::{EventBus, Progress, ProgressTask, SyncEvent};
pub use http::{HttpClient, LoopbackClient};
pub use remote_log::RemoteLogClient;
pub use remote_repository::RemoteRepository;
pub use synchronizer::{SyncState, SyncStats, Synchronizer};

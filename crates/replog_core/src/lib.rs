//! # replog Core
//!
//! Local store and change log for replog.
//!
//! This crate provides:
//! - [`Repository`]: entities and the [`StoreRecord`] of one store, over any
//!   [`KeyValueStore`](replog_storage::KeyValueStore)
//! - [`ChangeLog`]: the sequence-ordered, per-entity-coalesced log of pending
//!   changes, written in the same transaction as each entity write
//!
//! ## Example
//!
//! ```rust
//! use replog_core::{ChangeLogConfig, Repository};
//! use replog_protocol::{Entity, FindOptions, LogReader, WriteOptions};
//!
//! let repo = Repository::in_memory("people").with_change_log(ChangeLogConfig::default());
//! repo.save(&Entity::new("people", "p1"), &WriteOptions::new()).unwrap();
//!
//! let log = repo.change_log().unwrap();
//! let page = log.find_entries_after(0, &FindOptions::new()).unwrap();
//! assert_eq!(page.items.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_log;
mod codec;
mod config;
mod error;
mod keys;
mod record;
mod repository;

pub use change_log::{ChangeLog, LogStatistics, Mutation};
pub use config::ChangeLogConfig;
pub use error::{CoreError, CoreResult};
pub use record::StoreRecord;
pub use repository::{LifecycleEvent, LifecycleListener, Repository};

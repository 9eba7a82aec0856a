//! # replog Storage
//!
//! Ordered key-value store contract consumed by the replication core.
//!
//! Stores are **opaque ordered byte maps**: keys sort bytewise and values
//! are never interpreted. Everything above this crate (store records, log
//! indexes, entity documents) is encoded by its owner.
//!
//! ## Design Principles
//!
//! - `get`/`put`/`delete` with "error if exists/missing" toggles
//! - Ranged reads and deletes over a key prefix, with ordering and limits
//! - Single-writer transactions, joined by nested [`run_in_transaction`] calls
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Example
//!
//! ```rust
//! use replog_storage::{run_in_transaction, KeyValueStore, MemoryStore, PutOptions, RangeQuery};
//!
//! let store = MemoryStore::new();
//! run_in_transaction(&store, || {
//!     store.put(b"a/1", b"one", PutOptions::default())?;
//!     store.put(b"a/2", b"two", PutOptions::default())
//! })
//! .unwrap();
//!
//! let rows = store.get_range(&RangeQuery::prefix(b"a/".to_vec())).unwrap();
//! assert_eq!(rows.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod key;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use key::KeyBuilder;
pub use memory::MemoryStore;
pub use store::{run_in_transaction, DeleteOptions, KeyValueStore, PutOptions, RangeQuery};

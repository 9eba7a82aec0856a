//! # replog Protocol
//!
//! Types shared by both ends of a replicated pair.
//!
//! This crate provides:
//! - [`LogCursor`], [`LogEntry`] and [`LogPage`], the change-log read model
//! - [`LogFilter`], the projection filter evaluated by log readers
//! - [`LogReader`], the read contract implemented by local and remote logs
//! - [`Entity`], [`WriteOptions`] and [`EntityStore`], the entity write contract
//! - [`HttpRequest`] / [`HttpResponse`] and the `history-items` query codec
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod error;
mod filter;
mod http;
mod log;
pub mod query;

pub use entity::{Entity, EntityStore, WriteOptions, WriteSource};
pub use error::{ProtocolError, ProtocolResult};
pub use filter::{FilterCondition, LogFilter, PRIMARY_KEY_FIELD};
pub use http::{HttpRequest, HttpResponse, HttpService, Method};
pub use log::{FindOptions, LogCursor, LogEntry, LogPage, LogReader};

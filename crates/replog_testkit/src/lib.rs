//! # replog Testkit
//!
//! Test utilities for replog.
//!
//! This crate provides:
//! - [`LoopbackPeer`]: a logged repository served in process
//! - [`ReplicatedPair`]: a local repository synchronized with a peer
//! - Property-based generators of entity writes
//! - Tracing setup for test binaries
//!
//! ## Usage
//!
//! ```rust
//! use replog_testkit::prelude::*;
//!
//! let pair = ReplicatedPair::new();
//! pair.remote.save(person("p1", "Ada"));
//!
//! let stats = pair.run();
//! assert_eq!(stats.updated_local, 1);
//! assert!(pair.run().is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;

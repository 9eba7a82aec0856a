//! # replog Server
//!
//! Request handling for a store exposed to remote peers.
//!
//! This crate provides:
//! - [`Router`]: an ordered list of [`RouteHandler`]s, the first match wins
//! - [`RepositoryRoutes`]: generic entity routes used by remote proxies
//! - [`LogServerEndpoint`]: the change-log read routes, registered ahead of
//!   the generic ones
//! - [`Authorizer`]: the per-operation authorization hook, with an
//!   HMAC-SHA256 bearer-token implementation
//!
//! # Routes
//!
//! | Route | Operation |
//! |---|---|
//! | `GET /history` | `getLogCursor` |
//! | `GET /history-items` | `findLogEntriesAfter` |
//! | `GET /store` | `getStoreId` |
//! | `GET /ping` | none |
//! | `GET /items?id=` | `getItem` |
//! | `PUT /items?id=` | `putItem` |
//! | `DELETE /items?id=` | `deleteItem` |
//!
//! Paths are relative to [`ServerConfig::base_path`]. Errors are rendered
//! as `{"error": <kind>, "message": <text>}` with a 4xx or 5xx status.
//!
//! The server is transport neutral: it implements
//! [`HttpService`](replog_protocol::HttpService), so it can sit behind any
//! HTTP stack or be called in process.
//!
//! # Authentication
//!
//! ```rust
//! use replog_core::{ChangeLogConfig, Repository};
//! use replog_server::{AuthConfig, ServerConfig, StoreServer, TokenValidator};
//! use std::sync::Arc;
//!
//! let secret = b"my-secure-secret-32-bytes-long!".to_vec();
//! let repo = Arc::new(Repository::in_memory("hub").with_change_log(ChangeLogConfig::default()));
//! let config = ServerConfig::default().with_auth(AuthConfig::new(secret.clone()));
//! let server = StoreServer::new(config, repo);
//!
//! let token = TokenValidator::new(AuthConfig::new(secret)).create_token("device-1").unwrap();
//! assert!(!token.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod log_endpoint;
mod server;

pub use auth::{
    operations, AllowAll, AuthConfig, Authorizer, DenyAll, TokenAuthorizer, TokenValidator,
};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RepositoryRoutes, RouteContext, RouteHandler, Router};
pub use log_endpoint::LogServerEndpoint;
pub use server::StoreServer;

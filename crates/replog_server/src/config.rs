//! Server configuration.

use crate::auth::AuthConfig;

/// Configuration for the store server.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Path prefix stripped from every request (e.g. `/api/people`).
    pub base_path: String,
    /// Whether to require authentication.
    pub require_auth: bool,
    /// Token settings (if auth enabled).
    pub auth: Option<AuthConfig>,
}

impl ServerConfig {
    /// Creates a configuration serving from the root path without auth.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path prefix. A trailing slash is ignored.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        let base_path = base_path.into();
        self.base_path = base_path.trim_end_matches('/').to_string();
        self
    }

    /// Enables token authentication.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.require_auth = true;
        self.auth = Some(auth);
        self
    }

    /// Strips the base path from `path`. Returns `None` when `path` is
    /// outside of it.
    pub fn route_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.base_path.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.base_path.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

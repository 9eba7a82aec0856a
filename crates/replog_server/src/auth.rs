//! Authorization support for the store server.
//!
//! Every route names an operation (see [`operations`]) and asks the
//! server's [`Authorizer`] before touching the repository.
//!
//! ## Token Format
//!
//! [`TokenAuthorizer`] accepts bearer tokens built by [`TokenValidator`]:
//!
//! ```text
//! <client-id>.<issued-at unix millis>.<hex HMAC-SHA256 of "<client-id>.<issued-at>">
//! ```

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use replog_protocol::HttpRequest;
use sha2::Sha256;
use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Operation names passed to [`Authorizer::authorize`].
pub mod operations {
    /// `GET /history`
    pub const GET_LOG_CURSOR: &str = "getLogCursor";
    /// `GET /history-items`
    pub const FIND_LOG_ENTRIES_AFTER: &str = "findLogEntriesAfter";
    /// `GET /store`
    pub const GET_STORE_ID: &str = "getStoreId";
    /// `GET /items`
    pub const GET_ITEM: &str = "getItem";
    /// `PUT /items`
    pub const PUT_ITEM: &str = "putItem";
    /// `DELETE /items`
    pub const DELETE_ITEM: &str = "deleteItem";
}

/// Decides whether a request may run an operation.
pub trait Authorizer: Send + Sync {
    /// Returns `Ok(())` when `request` may run `operation`.
    ///
    /// # Errors
    ///
    /// [`ServerError::AuthenticationFailed`] without usable credentials,
    /// [`ServerError::NotAuthorized`] when they do not cover `operation`.
    fn authorize(&self, request: &HttpRequest, operation: &str) -> ServerResult<()>;
}

/// Authorizer that lets every request through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _request: &HttpRequest, _operation: &str) -> ServerResult<()> {
        Ok(())
    }
}

/// Authorizer that rejects every request. Installed when authentication is
/// required but no token settings are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl Authorizer for DenyAll {
    fn authorize(&self, _request: &HttpRequest, operation: &str) -> ServerResult<()> {
        Err(ServerError::AuthenticationFailed(format!(
            "'{operation}' requires authentication but no token settings are configured"
        )))
    }
}

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60), // 24 hours
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Creates and checks signed bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates a token for `client_id`, issued now.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Internal`] if the secret cannot key the MAC.
    pub fn create_token(&self, client_id: &str) -> ServerResult<String> {
        self.create_token_at(client_id, now_millis())
    }

    fn create_token_at(&self, client_id: &str, issued_at: u64) -> ServerResult<String> {
        let payload = format!("{client_id}.{issued_at}");
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Validates a token and returns the client it was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AuthenticationFailed`] for a malformed,
    /// forged or expired token.
    pub fn validate_token(&self, token: &str) -> ServerResult<String> {
        let mut parts = token.rsplitn(3, '.');
        let (Some(signature), Some(issued_at), Some(client_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ServerError::AuthenticationFailed("malformed token".into()));
        };

        let signature = hex::decode(signature)
            .map_err(|_| ServerError::AuthenticationFailed("malformed signature".into()))?;
        let payload = format!("{client_id}.{issued_at}");
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ServerError::AuthenticationFailed("invalid signature".into()))?;

        let issued_at: u64 = issued_at
            .parse()
            .map_err(|_| ServerError::AuthenticationFailed("malformed timestamp".into()))?;
        let expiry_millis = millis(self.config.token_expiry);
        if now_millis() > issued_at.saturating_add(expiry_millis) {
            return Err(ServerError::AuthenticationFailed("token expired".into()));
        }

        Ok(client_id.to_string())
    }

    fn mac(&self) -> ServerResult<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("invalid HMAC key: {e}")))
    }
}

fn now_millis() -> u64 {
    millis(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default())
}

/// Whole milliseconds of `duration`, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Authorizer requiring a valid bearer token.
///
/// By default a valid token allows every operation;
/// [`TokenAuthorizer::allowing`] restricts it to a set.
#[derive(Debug, Clone)]
pub struct TokenAuthorizer {
    validator: TokenValidator,
    allowed: Option<BTreeSet<String>>,
}

impl TokenAuthorizer {
    /// Creates an authorizer checking tokens with `validator`.
    pub fn new(validator: TokenValidator) -> Self {
        Self {
            validator,
            allowed: None,
        }
    }

    /// Restricts valid tokens to `operations`.
    pub fn allowing<'a>(mut self, operations: impl IntoIterator<Item = &'a str>) -> Self {
        self.allowed = Some(operations.into_iter().map(str::to_string).collect());
        self
    }
}

impl Authorizer for TokenAuthorizer {
    fn authorize(&self, request: &HttpRequest, operation: &str) -> ServerResult<()> {
        let token = request
            .bearer_token()
            .ok_or_else(|| ServerError::AuthenticationFailed("missing bearer token".into()))?;
        let client = self.validator.validate_token(token)?;

        if let Some(allowed) = &self.allowed {
            if !allowed.contains(operation) {
                return Err(ServerError::NotAuthorized(format!(
                    "client '{client}' may not run '{operation}'"
                )));
            }
        }
        Ok(())
    }
}

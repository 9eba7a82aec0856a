//! Connection to a remote store.

use crate::error::{SyncError, SyncResult};
use crate::http::HttpClient;
use parking_lot::RwLock;
use replog_protocol::{HttpRequest, HttpResponse, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Base URL, client and credentials shared by every remote proxy of one
/// store.
pub struct RemoteConnection {
    base_url: Url,
    client: Arc<dyn HttpClient>,
    token: RwLock<Option<String>>,
    timeout: Duration,
}

impl fmt::Debug for RemoteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConnection")
            .field("base_url", &self.base_url.as_str())
            .field("has_token", &self.has_token())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteConnection {
    /// Creates a connection to the store served under `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Url`] if `base_url` is not an absolute URL.
    pub fn new(base_url: &str, client: Arc<dyn HttpClient>) -> SyncResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            client,
            token: RwLock::new(None),
            timeout: Duration::from_secs(60),
        })
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the authorization token.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    /// Replaces or clears the authorization token.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    /// Returns `true` when requests carry an authorization token.
    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    /// Returns the base URL, always ending with `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the URL of `route` with `query` appended.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Url`] if `route` cannot be joined.
    pub fn url(&self, route: &str, query: &[(String, String)]) -> SyncResult<Url> {
        let mut url = self.base_url.join(route.trim_start_matches('/'))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Sends a request and returns the successful response.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Connection`] when no response arrives and
    /// [`SyncError::Transport`] for a non-success status.
    pub fn send(
        &self,
        method: Method,
        route: &str,
        query: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> SyncResult<HttpResponse> {
        let url = self.url(route, query)?;
        let mut request = HttpRequest::new(method, url.as_str()).with_timeout(self.timeout);
        if let Some(token) = self.token.read().as_deref() {
            request = request.with_bearer(token);
        }
        if let Some(body) = body {
            request = request.with_header("content-type", "application/json");
            request.body = body;
        }

        let response = self.client.send(&request).map_err(SyncError::Connection)?;
        debug!(method = %method, url = %url, status = response.status, "Remote request");
        if !response.is_success() {
            return Err(SyncError::transport(response.status, response.body_text()));
        }
        Ok(response)
    }

    /// Sends a `GET` request and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// Returns any [`send`](Self::send) error, or [`SyncError::Protocol`]
    /// if the body does not decode.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        route: &str,
        query: &[(String, String)],
    ) -> SyncResult<T> {
        Ok(self.send(Method::Get, route, query, None)?.json()?)
    }

    /// Sends a request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns any [`send`](Self::send) error.
    pub fn send_json<B: Serialize>(
        &self,
        method: Method,
        route: &str,
        query: &[(String, String)],
        body: &B,
    ) -> SyncResult<HttpResponse> {
        let body = serde_json::to_vec(body).map_err(replog_protocol::ProtocolError::from)?;
        self.send(method, route, query, Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::LoopbackClient;
    use replog_protocol::HttpService;

    struct Fixed(u16);

    impl HttpService for Fixed {
        fn handle(&self, _request: &HttpRequest) -> HttpResponse {
            HttpResponse::new(self.0, b"{\"error\":\"nope\"}".to_vec())
        }
    }

    fn connection(status: u16) -> (Arc<LoopbackClient<Fixed>>, RemoteConnection) {
        let client = Arc::new(LoopbackClient::new(Fixed(status)));
        let connection =
            RemoteConnection::new("http://hub.local/api/people", client.clone()).unwrap();
        (client, connection)
    }

    #[test]
    fn routes_are_joined_under_base_path() {
        let (_, connection) = connection(200);
        assert_eq!(connection.base_url().as_str(), "http://hub.local/api/people/");

        let url = connection
            .url("/history-items", &[("startAfterSequence".into(), "3".into())])
            .unwrap();
        assert_eq!(url.as_str(), "http://hub.local/api/people/history-items?startAfterSequence=3");
    }

    #[test]
    fn token_is_sent_as_bearer() {
        let (client, connection) = connection(200);
        let connection = connection.with_token("abc");
        assert!(connection.has_token());

        connection.send(Method::Get, "store", &[], None).unwrap();
        assert_eq!(client.last_request().unwrap().bearer_token(), Some("abc"));

        connection.set_token(None);
        connection.send(Method::Get, "store", &[], None).unwrap();
        assert_eq!(client.last_request().unwrap().bearer_token(), None);
    }

    #[test]
    fn error_status_becomes_transport_error() {
        let (_, connection) = connection(503);
        let err = connection.get_json::<serde_json::Value>("history", &[]).unwrap_err();
        match err {
            SyncError::Transport { status, body } => {
                assert_eq!(status, 503);
                assert!(body.contains("nope"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unreachable_peer_is_connection_error() {
        let (client, connection) = connection(200);
        client.set_offline(true);
        assert!(matches!(
            connection.send(Method::Get, "ping", &[], None),
            Err(SyncError::Connection(_))
        ));
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let client = Arc::new(LoopbackClient::new(Fixed(200)));
        assert!(matches!(
            RemoteConnection::new("api/people", client),
            Err(SyncError::Url(_))
        ));
    }
}

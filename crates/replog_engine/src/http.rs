//! HTTP client abstraction.
//!
//! The engine never opens sockets itself. An [`HttpClient`] carries
//! requests to the remote store: a real HTTP stack in production, a
//! [`LoopbackClient`] wired straight into a server in process.

use parking_lot::RwLock;
use replog_protocol::{HttpRequest, HttpResponse, HttpService};
use std::sync::atomic::{AtomicBool, Ordering};

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
/// Returning `Err` means no response was received; error statuses are
/// returned as `Ok` responses.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// An HTTP client that routes requests directly to an [`HttpService`].
///
/// Useful for testing without actual network overhead. The client can be
/// switched offline to simulate an unreachable peer.
pub struct LoopbackClient<S: HttpService> {
    service: S,
    offline: AtomicBool,
    last_request: RwLock<Option<HttpRequest>>,
}

impl<S: HttpService> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given service.
    pub fn new(service: S) -> Self {
        Self {
            service,
            offline: AtomicBool::new(false),
            last_request: RwLock::new(None),
        }
    }

    /// Makes every following request fail, or succeed again.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns the most recent request, including refused ones.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.last_request.read().clone()
    }
}

impl<S: HttpService> HttpClient for LoopbackClient<S> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        *self.last_request.write() = Some(request.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(format!("connection refused: {}", request.url));
        }
        Ok(self.service.handle(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl HttpService for Echo {
        fn handle(&self, request: &HttpRequest) -> HttpResponse {
            HttpResponse::new(200, request.url.clone().into_bytes())
        }
    }

    #[test]
    fn loopback_forwards_requests() {
        let client = LoopbackClient::new(Echo);
        let response = client.send(&HttpRequest::get("http://hub/ping")).unwrap();
        assert_eq!(response.body_text(), "http://hub/ping");
        assert_eq!(client.last_request().unwrap().url, "http://hub/ping");
    }

    #[test]
    fn offline_loopback_refuses() {
        let client = LoopbackClient::new(Echo);
        client.set_offline(true);
        assert!(client.send(&HttpRequest::get("http://hub/ping")).is_err());

        client.set_offline(false);
        assert!(client.send(&HttpRequest::get("http://hub/ping")).is_ok());
    }
}

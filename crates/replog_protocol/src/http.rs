//! Transport-neutral HTTP request and response types.
//!
//! Clients and servers exchange these values directly, so the same routing
//! code runs behind a real HTTP stack or an in-process loopback.

use crate::error::ProtocolResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Base used to resolve request URLs that carry only a path.
const LOCAL_BASE: &str = "http://localhost/";

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// POST
    Post,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL, or a path with an optional query string.
    pub url: String,
    /// Headers, keyed by lowercase name.
    pub headers: BTreeMap<String, String>,
    /// Request body.
    pub body: Vec<u8>,
    /// How long the client may wait for the response.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Creates a request without headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: Vec::new(),
            timeout: None,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a PUT request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    /// Creates a DELETE request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Sets a bearer token.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("authorization", format!("Bearer {token}"))
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn with_json<T: Serialize>(mut self, value: &T) -> ProtocolResult<Self> {
        self.body = serde_json::to_vec(value)?;
        Ok(self.with_header("content-type", "application/json"))
    }

    /// Sets the response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the bearer token of the `authorization` header.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
    }

    /// Parses the request URL, resolving a bare path against localhost.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed.
    pub fn parsed_url(&self) -> ProtocolResult<Url> {
        Ok(Url::parse(LOCAL_BASE)?.join(&self.url)?)
    }

    /// Returns the URL path.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed.
    pub fn path(&self) -> ProtocolResult<String> {
        Ok(self.parsed_url()?.path().to_string())
    }

    /// Returns the decoded query parameters, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed.
    pub fn query_pairs(&self) -> ProtocolResult<Vec<(String, String)>> {
        Ok(self
            .parsed_url()?
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect())
    }

    /// Decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Creates a response without body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    /// Creates a JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn json_with_status<T: Serialize>(status: u16, value: &T) -> ProtocolResult<Self> {
        Ok(Self::new(status, serde_json::to_vec(value)?))
    }

    /// Creates a `200 OK` JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn ok_json<T: Serialize>(value: &T) -> ProtocolResult<Self> {
        Self::json_with_status(200, value)
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Anything that answers HTTP requests: a store server, a proxy, a test
/// double.
pub trait HttpService: Send + Sync {
    /// Handles one request. Failures are reported as error statuses.
    fn handle(&self, request: &HttpRequest) -> HttpResponse;
}

impl<S: HttpService + ?Sized> HttpService for std::sync::Arc<S> {
    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        (**self).handle(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_url_is_resolved() {
        let request =
            HttpRequest::get("/store/history-items?startAfterSequence=3&filter.kind=a%20b");
        assert_eq!(request.path().unwrap(), "/store/history-items");
        assert_eq!(
            request.query_pairs().unwrap(),
            vec![
                ("startAfterSequence".to_string(), "3".to_string()),
                ("filter.kind".to_string(), "a b".to_string()),
            ]
        );
    }

    #[test]
    fn absolute_url_keeps_its_path() {
        let request = HttpRequest::get("http://example.com:8080/api/history");
        assert_eq!(request.path().unwrap(), "/api/history");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let request = HttpRequest::get("/").with_bearer("abc");
        assert_eq!(request.header("Authorization"), Some("Bearer abc"));
        assert_eq!(request.bearer_token(), Some("abc"));
    }

    #[test]
    fn response_classification() {
        assert!(HttpResponse::empty(204).is_success());
        assert!(!HttpResponse::empty(404).is_success());
        assert_eq!(HttpResponse::new(500, b"boom".to_vec()).body_text(), "boom");
    }
}

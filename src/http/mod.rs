//! HTTP plumbing: request/response values, the transport seam and the retrying executor
//!
//! Requests carry lower-cased header names in a `BTreeMap` so signers can walk
//! them in canonical order. Responses are always fully buffered, which returns
//! the connection to the pool whatever the outcome.

pub mod executor;
pub mod transport;

pub use executor::{Authorizer, RequestExecutor, RetryPolicy};
pub use transport::{HyperTransport, Transport};

use bytes::Bytes;
use hyper::{Method, StatusCode};
use std::collections::BTreeMap;

/// Outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL including any query string
    pub url: String,
    /// Header names are lower-case
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Path and query of the URL, e.g. `/bucket/key?uploads`
    pub fn path_and_query(&self) -> &str {
        path_and_query(&self.url)
    }
}

/// Path and query of an absolute URL; `/` when the URL has no path
pub(crate) fn path_and_query(url: &str) -> &str {
    let after_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    match after_scheme.find('/') {
        Some(pos) => &after_scheme[pos..],
        None => "/",
    }
}

/// Fully buffered response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Header names are lower-case
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// ETag header with surrounding quotes removed
    pub fn etag(&self) -> Option<String> {
        self.header("etag").map(|v| v.trim_matches('"').to_string())
    }

    /// Whether the body looks like an XML document
    pub fn is_xml(&self) -> bool {
        let declared = self
            .header("content-type")
            .map(|ct| ct.contains("xml"))
            .unwrap_or(false);
        declared || self.body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'<')
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_query() {
        let req = HttpRequest::new(Method::GET, "https://s3.amazonaws.com/bucket/a%20b?uploads");
        assert_eq!(req.path_and_query(), "/bucket/a%20b?uploads");

        let req = HttpRequest::new(Method::GET, "http://localhost:9000");
        assert_eq!(req.path_and_query(), "/");
    }

    #[test]
    fn test_headers_are_lowercased() {
        let req = HttpRequest::new(Method::PUT, "https://h/b").with_header("Content-Type", "text/plain");
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn test_response_helpers() {
        let resp = HttpResponse::new(StatusCode::OK)
            .with_header("ETag", "\"abc123\"")
            .with_body("  <Error/>");
        assert_eq!(resp.etag().as_deref(), Some("abc123"));
        assert!(resp.is_xml());

        let plain = HttpResponse::new(StatusCode::BAD_GATEWAY).with_body("upstream down");
        assert!(!plain.is_xml());
    }
}

//! Network transport behind the executor
//!
//! The hyper-based transport is tuned like a long-lived storage client:
//! - HTTP/1.1 only
//! - pooled idle connections (90s idle timeout)
//! - TCP_NODELAY and 90s TCP keepalive
//! - native-tls for HTTPS connections

use super::{HttpRequest, HttpResponse};
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::collections::BTreeMap;
use std::time::Duration;

/// Sends one request and returns the fully buffered response.
///
/// Implementations must not retry; retry policy lives in the executor.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Transport backed by a pooled hyper client
///
/// Cloning shares the pooled connector.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    timeout: Duration,
}

impl HyperTransport {
    pub fn new() -> Result<Self> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(10)));
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = TlsConnector::new()
            .map_err(|e| ServiceError::Transport(format!("failed to build TLS connector: {}", e)))?;
        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(64)
            .set_host(true)
            .build(https);

        Ok(Self {
            client,
            timeout: Duration::from_secs(300),
        })
    }

    /// Set the per-request timeout (default 300s)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let hyper_request = builder.body(Full::new(request.body))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(hyper_request))
            .await
            .map_err(|_| {
                ServiceError::Transport(format!("request timed out after {:?}", self.timeout))
            })??;

        let status = response.status();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        // Drain the body so the connection returns to the pool
        let body = response
            .collect()
            .await
            .map_err(|e| ServiceError::Transport(format!("body error: {}", e)))?
            .to_bytes();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

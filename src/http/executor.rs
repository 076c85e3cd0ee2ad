//! Retrying request executor
//!
//! Every attempt is re-authorized (the signature covers the current time) and
//! its response classified into an [`Attempt`]. Retry counters live in
//! [`RetryState`], so the budget for each failure class is plain data:
//! - 5xx: fixed delay, fatal once `internal_error_max` attempts have failed
//! - clock skew: offset corrected from the response `Date`, retried once
//! - `RequestTimeout`: immediate retry, bounded
//! - 307: follow `Location`, bounded

use super::{HttpRequest, HttpResponse, Transport};
use crate::clock::TimeOffset;
use crate::config::RetryConfig;
use crate::error::{RemoteError, Result, ServiceError};
use chrono::{DateTime, Utc};
use hyper::StatusCode;
use std::sync::Arc;
use std::time::Duration;

/// Adds authentication to a request just before it is sent
pub trait Authorizer: Send + Sync {
    fn authorize(&self, request: &mut HttpRequest, now: DateTime<Utc>) -> Result<()>;
}

/// Error codes meaning the request time was rejected as skewed
const CLOCK_SKEW_CODES: &[&str] = &["RequestTimeTooSkewed", "RequestExpired"];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub internal_error_max: u32,
    pub internal_error_delay: Duration,
    pub request_timeout_max: u32,
    pub redirect_max: u32,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            internal_error_max: config.internal_error_max,
            internal_error_delay: config.internal_error_delay(),
            request_timeout_max: config.request_timeout_max,
            redirect_max: config.redirect_max,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Outcome of one attempt
#[derive(Debug)]
enum Attempt {
    Success(HttpResponse),
    Retry(RetryReason),
    Fatal(ServiceError),
}

#[derive(Debug)]
enum RetryReason {
    InternalError,
    ClockSkew,
    RequestTimeout,
    Redirect(String),
}

/// Per-call retry counters
#[derive(Debug, Default)]
struct RetryState {
    internal_errors: u32,
    skew_corrections: u32,
    request_timeouts: u32,
    redirects: u32,
}

/// Sends requests through a [`Transport`], applying authorization and the retry policy
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    authorizer: Arc<dyn Authorizer>,
    clock: Arc<TimeOffset>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        authorizer: Arc<dyn Authorizer>,
        clock: Arc<TimeOffset>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            authorizer,
            clock,
            policy,
        }
    }

    pub fn clock(&self) -> &Arc<TimeOffset> {
        &self.clock
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying per policy, until a response with one of the
    /// `expected` status codes arrives or a failure becomes fatal.
    pub async fn execute(&self, mut request: HttpRequest, expected: &[u16]) -> Result<HttpResponse> {
        let mut state = RetryState::default();

        loop {
            self.authorizer.authorize(&mut request, self.clock.now())?;
            tracing::debug!(method = %request.method, url = %request.url, "Sending request");

            let response = self.transport.send(request.clone()).await?;

            match self.classify(response, expected, &mut state) {
                Attempt::Success(response) => return Ok(response),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Retry(RetryReason::InternalError) => {
                    tokio::time::sleep(self.policy.internal_error_delay).await;
                }
                Attempt::Retry(RetryReason::Redirect(location)) => {
                    request.url = location;
                }
                Attempt::Retry(RetryReason::ClockSkew) | Attempt::Retry(RetryReason::RequestTimeout) => {}
            }
        }
    }

    fn classify(&self, response: HttpResponse, expected: &[u16], state: &mut RetryState) -> Attempt {
        let status = response.status;
        if expected.contains(&status.as_u16()) {
            return Attempt::Success(response);
        }

        if status == StatusCode::TEMPORARY_REDIRECT {
            if let Some(location) = response.header("location") {
                state.redirects += 1;
                if state.redirects > self.policy.redirect_max {
                    return Attempt::Fatal(ServiceError::TooManyRedirects {
                        limit: self.policy.redirect_max,
                    });
                }
                tracing::debug!(location = %location, "Following temporary redirect");
                return Attempt::Retry(RetryReason::Redirect(location.to_string()));
            }
        }

        if status.is_server_error() {
            state.internal_errors += 1;
            if state.internal_errors >= self.policy.internal_error_max {
                tracing::warn!(
                    status = %status,
                    attempts = state.internal_errors,
                    "Internal server errors exhausted the retry budget"
                );
                return Attempt::Fatal(ServiceError::TooManyInternalErrors {
                    attempts: state.internal_errors,
                });
            }
            tracing::warn!(
                status = %status,
                attempt = state.internal_errors,
                delay_ms = self.policy.internal_error_delay.as_millis() as u64,
                "Internal server error, retrying"
            );
            return Attempt::Retry(RetryReason::InternalError);
        }

        let remote = match Self::remote_error(&response) {
            Some(remote) => remote,
            None => {
                return Attempt::Fatal(ServiceError::UnexpectedStatus {
                    status,
                    body: response.body_text(),
                })
            }
        };

        if CLOCK_SKEW_CODES.contains(&remote.code.as_str()) && state.skew_corrections == 0 {
            let adjusted = remote
                .server_date
                .as_deref()
                .and_then(|date| self.clock.adjust_from_server_date(date));
            if adjusted.is_some() {
                state.skew_corrections += 1;
                return Attempt::Retry(RetryReason::ClockSkew);
            }
        }

        if remote.code == "RequestTimeout" && state.request_timeouts < self.policy.request_timeout_max {
            state.request_timeouts += 1;
            tracing::warn!(attempt = state.request_timeouts, "Request timed out, retrying");
            return Attempt::Retry(RetryReason::RequestTimeout);
        }

        Attempt::Fatal(remote.into())
    }

    /// Decode the error document of a failed response; unparseable bodies yield `None`
    fn remote_error(response: &HttpResponse) -> Option<RemoteError> {
        if !response.is_xml() {
            return None;
        }
        let server_date = response.header("date").map(str::to_string);
        RemoteError::parse(response.status.as_u16(), &response.body)
            .ok()
            .flatten()
            .map(|remote| remote.with_server_date(server_date))
    }
}

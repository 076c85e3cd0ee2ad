//! Integration tests for the retrying request executor
//!
//! The executor runs against a scripted transport; tests that sleep between
//! retries use a paused clock so the fixed delays can be measured exactly.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use hyper::{Method, StatusCode};
use s3rest::http::{HttpRequest, RequestExecutor, RetryPolicy};
use s3rest::s3::signer::http_date;
use s3rest::s3::RequestSigner;
use s3rest::{ServiceError, TimeOffset};
use std::sync::Arc;
use std::time::Duration;

const URL: &str = "https://s3.amazonaws.com/bucket/key.txt";

fn policy() -> RetryPolicy {
    RetryPolicy {
        internal_error_max: 5,
        internal_error_delay: Duration::from_millis(1000),
        request_timeout_max: 2,
        redirect_max: 2,
    }
}

fn executor(transport: Arc<ScriptedTransport>, policy: RetryPolicy) -> RequestExecutor {
    RequestExecutor::new(
        transport,
        Arc::new(RequestSigner::new(credentials())),
        Arc::new(TimeOffset::new()),
        policy,
    )
}

fn get() -> HttpRequest {
    HttpRequest::new(Method::GET, URL)
}

#[tokio::test(start_paused = true)]
async fn test_internal_errors_retried_after_fixed_delay() {
    let transport = ScriptedTransport::new(vec![
        error_response(500, "InternalError"),
        error_response(503, "SlowDown"),
        empty_response(200),
    ]);
    let executor = executor(transport.clone(), policy());

    let start = tokio::time::Instant::now();
    let response = executor.execute(get(), &[200]).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(transport.request_count(), 3);
    assert!(elapsed >= Duration::from_millis(2000), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2050), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_internal_error_budget() {
    // One short of the budget still succeeds
    let mut script: Vec<_> = (0..4).map(|_| empty_response(500)).collect();
    script.push(empty_response(200));
    let transport = ScriptedTransport::new(script);
    let result = executor(transport.clone(), policy()).execute(get(), &[200]).await;
    assert!(result.is_ok());
    assert_eq!(transport.request_count(), 5);

    // Reaching the budget is fatal and nothing more is sent
    let mut script: Vec<_> = (0..5).map(|_| empty_response(500)).collect();
    script.push(empty_response(200));
    let transport = ScriptedTransport::new(script);
    let err = executor(transport.clone(), policy())
        .execute(get(), &[200])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TooManyInternalErrors { attempts: 5 }));
    assert_eq!(transport.request_count(), 5);
}

#[tokio::test]
async fn test_clock_skew_corrected_once() {
    let server_date = http_date(Utc::now() + ChronoDuration::hours(1));
    let transport = ScriptedTransport::new(vec![
        dated_error_response(403, "RequestTimeTooSkewed", &server_date),
        empty_response(200),
    ]);
    let executor = executor(transport.clone(), policy());

    executor.execute(get(), &[200]).await.unwrap();

    let offset = executor.clock().offset_millis();
    assert!((3_595_000..=3_601_000).contains(&offset), "offset {}", offset);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    // The retry is re-signed with the corrected time
    assert_ne!(requests[0].header("date"), requests[1].header("date"));
    assert_ne!(
        requests[0].header("authorization"),
        requests[1].header("authorization")
    );
}

#[tokio::test]
async fn test_second_skew_error_is_fatal() {
    let server_date = http_date(Utc::now() + ChronoDuration::minutes(30));
    let transport = ScriptedTransport::new(vec![
        dated_error_response(403, "RequestTimeTooSkewed", &server_date),
        dated_error_response(403, "RequestTimeTooSkewed", &server_date),
        empty_response(200),
    ]);

    let err = executor(transport.clone(), policy())
        .execute(get(), &[200])
        .await
        .unwrap_err();
    assert!(err.is_error_code("RequestTimeTooSkewed"));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_skew_without_server_date_is_fatal() {
    let transport = ScriptedTransport::new(vec![
        error_response(403, "RequestExpired"),
        empty_response(200),
    ]);
    let executor = executor(transport.clone(), policy());

    let err = executor.execute(get(), &[200]).await.unwrap_err();
    assert!(err.is_error_code("RequestExpired"));
    assert_eq!(transport.request_count(), 1);
    assert_eq!(executor.clock().offset_millis(), 0);
}

#[tokio::test]
async fn test_request_timeout_retried_up_to_limit() {
    let transport = ScriptedTransport::new(vec![
        error_response(400, "RequestTimeout"),
        error_response(400, "RequestTimeout"),
        empty_response(200),
    ]);
    let result = executor(transport.clone(), policy()).execute(get(), &[200]).await;
    assert!(result.is_ok());
    assert_eq!(transport.request_count(), 3);

    let transport = ScriptedTransport::new(vec![
        error_response(400, "RequestTimeout"),
        error_response(400, "RequestTimeout"),
        error_response(400, "RequestTimeout"),
        empty_response(200),
    ]);
    let err = executor(transport.clone(), policy())
        .execute(get(), &[200])
        .await
        .unwrap_err();
    assert!(err.is_error_code("RequestTimeout"));
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn test_temporary_redirect_followed() {
    let location = "https://bucket.s3-external-1.amazonaws.com/bucket/key.txt";
    let transport = ScriptedTransport::new(vec![
        empty_response(307).with_header("Location", location),
        empty_response(200),
    ]);

    executor(transport.clone(), policy())
        .execute(get(), &[200])
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url, URL);
    assert_eq!(requests[1].url, location);
    assert!(requests[1].header("authorization").is_some());
}

#[tokio::test]
async fn test_redirect_limit() {
    let location = "https://elsewhere.example.com/bucket/key.txt";
    let transport = ScriptedTransport::new(
        (0..4)
            .map(|_| empty_response(307).with_header("Location", location))
            .collect(),
    );

    let err = executor(transport.clone(), policy())
        .execute(get(), &[200])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TooManyRedirects { limit: 2 }));
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn test_non_xml_failure_is_unexpected_status() {
    let transport = ScriptedTransport::new(vec![empty_response(403)
        .with_header("Content-Type", "text/html")
        .with_body("Forbidden")]);

    let err = executor(transport, policy())
        .execute(get(), &[200])
        .await
        .unwrap_err();
    match err {
        ServiceError::UnexpectedStatus { status, body } => {
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body, "Forbidden");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_remote_error_carries_service_fields() {
    let transport = ScriptedTransport::new(vec![xml_response(
        404,
        &error_body("NoSuchKey", "The specified key does not exist."),
    )]);

    let err = executor(transport.clone(), policy())
        .execute(get(), &[200])
        .await
        .unwrap_err();
    let remote = err.remote().expect("remote error");
    assert_eq!(remote.status, 404);
    assert_eq!(remote.code, "NoSuchKey");
    assert_eq!(remote.message, "The specified key does not exist.");
    assert_eq!(remote.request_id.as_deref(), Some("4442587FB7D0A2F9"));
    assert_eq!(remote.host_id.as_deref(), Some("host-1"));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_any_expected_status_accepted() {
    let transport = ScriptedTransport::new(vec![empty_response(204)]);
    let response = executor(transport, policy())
        .execute(HttpRequest::new(Method::DELETE, URL), &[200, 204])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_transport_failure_not_retried() {
    let transport = ScriptedTransport::new(vec![]);
    let err = executor(transport.clone(), policy())
        .execute(get(), &[200])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Transport(_)));
    assert_eq!(transport.request_count(), 1);
}

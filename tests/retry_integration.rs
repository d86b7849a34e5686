//! Integration tests for the extended outbound client
//!
//! Runs the full reqwest -> retry -> instrumentation stack against wiremock
//! servers that fail a fixed number of times before succeeding.

use std::sync::Arc;
use std::time::Duration;
use svc_http::adapters::outbound::{
    ChannelRetryObserver, ExpvarMetricsStore, ReqwestTransport, TracingRetryObserver,
    NEW_CONNECTIONS, REUSED_CONNECTIONS,
};
use svc_http::application::extend_transport;
use svc_http::domain::ports::Transport;
use svc_http::{BackoffPolicy, OutboundRequest, RetryConfig, TransportError};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy::new(Duration::from_millis(5), Duration::from_millis(20))
}

/// Server answering 500 for the first `failures` requests, then 200 "hello".
async fn flaky_server(failures: u64) -> MockServer {
    let server = MockServer::start().await;
    if failures > 0 {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(failures)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;
    server
}

async fn requests_received(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

#[tokio::test]
async fn test_retry_budget_table() {
    // (max_retries, failures before success, expected status, expected requests)
    let cases: [(i32, u64, u16, usize); 8] = [
        (-1, 2, 500, 1),
        (0, 0, 200, 1),
        (0, 2, 500, 1),
        (1, 2, 500, 2),
        (2, 2, 200, 3),
        (3, 2, 200, 3),
        (4, 2, 200, 3),
        (4, 5, 500, 5),
    ];

    for (max_retries, failures, want_status, want_requests) in cases {
        let server = flaky_server(failures).await;
        let (observer, mut notifications) = ChannelRetryObserver::channel();
        let metrics = Arc::new(ExpvarMetricsStore::new());
        let client = extend_transport(
            ReqwestTransport::new(reqwest::Client::new()),
            RetryConfig::new(max_retries),
            fast_backoff(),
            Arc::new(observer),
            metrics.clone(),
        );

        let resp = client
            .execute(&OutboundRequest::get(&server.uri()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            resp.status.as_u16(),
            want_status,
            "max_retries={} failures={}",
            max_retries,
            failures
        );
        assert_eq!(requests_received(&server).await, want_requests);

        let budget = max_retries.max(0) as u64;
        let mut notified = 0;
        while notifications.try_recv().is_ok() {
            notified += 1;
        }
        assert_eq!(notified, failures.min(budget), "max_retries={}", max_retries);

        // One logical call regardless of attempts
        let snap = metrics.snapshot();
        assert_eq!(snap[REUSED_CONNECTIONS], 1);
        assert_eq!(snap[NEW_CONNECTIONS], 0);
    }
}

#[traced_test]
#[tokio::test]
async fn test_two_retries_reach_success() {
    let server = flaky_server(2).await;
    let (observer, mut notifications) = ChannelRetryObserver::channel();
    let client = extend_transport(
        ReqwestTransport::new(reqwest::Client::new()),
        RetryConfig::new(2),
        fast_backoff(),
        Arc::new(observer),
        Arc::new(ExpvarMetricsStore::new()),
    );

    let resp = client
        .execute(&OutboundRequest::get(&server.uri()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status, reqwest::StatusCode::OK);
    assert_eq!(resp.text(), "hello");

    let first = notifications.try_recv().unwrap();
    let second = notifications.try_recv().unwrap();
    assert!(notifications.try_recv().is_err());
    assert_eq!((first.number, second.number), (1, 2));
    assert_eq!(first.failure.to_string(), "unexpected status 500 Internal Server Error");
}

#[traced_test]
#[tokio::test]
async fn test_one_retry_returns_last_failure() {
    let server = flaky_server(2).await;
    let client = extend_transport(
        ReqwestTransport::new(reqwest::Client::new()),
        RetryConfig::new(1),
        fast_backoff(),
        Arc::new(TracingRetryObserver),
        Arc::new(ExpvarMetricsStore::new()),
    );

    let resp = client
        .execute(&OutboundRequest::get(&server.uri()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(requests_received(&server).await, 2);
    assert!(logs_contain("attempt:1 retrying"));
    assert!(!logs_contain("attempt:2 retrying"));
}

#[tokio::test]
async fn test_connection_refused_exhausts_budget() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (observer, mut notifications) = ChannelRetryObserver::channel();
    let client = extend_transport(
        ReqwestTransport::new(reqwest::Client::new()),
        RetryConfig::new(2),
        fast_backoff(),
        Arc::new(observer),
        Arc::new(ExpvarMetricsStore::new()),
    );

    let err = client
        .execute(&OutboundRequest::get(&format!("http://{}/", addr)).unwrap())
        .await
        .unwrap_err();
    assert!(err.is_retryable(), "unexpected error {:?}", err);

    let mut notified = 0;
    while notifications.try_recv().is_ok() {
        notified += 1;
    }
    assert_eq!(notified, 2);
}

#[tokio::test]
async fn test_cancellation_during_backoff_stops_retries() {
    let server = flaky_server(10).await;
    let client = extend_transport(
        ReqwestTransport::new(reqwest::Client::new()),
        RetryConfig::new(10),
        BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(5)),
        Arc::new(TracingRetryObserver),
        Arc::new(ExpvarMetricsStore::new()),
    );

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let request = OutboundRequest::get(&server.uri())
        .unwrap()
        .with_cancellation(token);
    let err = tokio::time::timeout(Duration::from_secs(3), client.execute(&request))
        .await
        .expect("cancellation did not interrupt backoff")
        .unwrap_err();

    assert_eq!(err, TransportError::Cancelled);
    assert_eq!(requests_received(&server).await, 1);
}

#[tokio::test]
async fn test_concurrent_callers_have_independent_budgets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let metrics = Arc::new(ExpvarMetricsStore::new());
    let client = Arc::new(extend_transport(
        ReqwestTransport::new(reqwest::Client::new()),
        RetryConfig::new(1),
        fast_backoff(),
        Arc::new(TracingRetryObserver),
        metrics.clone(),
    ));

    let calls = (0..8).map(|_| {
        let client = client.clone();
        let url = server.uri();
        async move { client.execute(&OutboundRequest::get(&url).unwrap()).await }
    });
    let results = futures::future::join_all(calls).await;

    for result in results {
        assert_eq!(result.unwrap().status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
    }
    assert_eq!(requests_received(&server).await, 16);
    assert_eq!(metrics.snapshot()[REUSED_CONNECTIONS], 8);
}

#[tokio::test]
async fn test_missing_url_is_not_retried() {
    let (observer, mut notifications) = ChannelRetryObserver::channel();
    let client = extend_transport(
        ReqwestTransport::new(reqwest::Client::new()),
        RetryConfig::new(3),
        fast_backoff(),
        Arc::new(observer),
        Arc::new(ExpvarMetricsStore::new()),
    );

    let err = client.execute(&OutboundRequest::default()).await.unwrap_err();
    assert_eq!(err, TransportError::MissingUrl);
    assert!(notifications.try_recv().is_err());
}

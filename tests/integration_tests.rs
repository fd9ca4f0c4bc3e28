//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: config → throttler → reqwest transport → mock API

use reqwest::{Method, Request, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use throttler::{
    BackoffOverflow, Error, ReqwestTransport, ThrottleLayer, Throttler, ThrottlerConfig,
};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use tower::{Layer, ServiceExt};
use url::Url;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fast throttler for tests against a local mock server
fn fast_throttler(retry_limit: u32) -> Throttler {
    Throttler::builder(1_000, retry_limit)
        .backoff(
            Duration::from_millis(10),
            Duration::from_millis(100),
            BackoffOverflow::Wrap,
        )
        .build()
        .unwrap()
}

fn get(server: &MockServer, route: &str) -> Request {
    let url = Url::parse(&format!("{}{route}", server.uri())).unwrap();
    Request::new(Method::GET, url)
}

// ============================================================================
// Retry behaviour over HTTP
// ============================================================================

#[tokio::test]
async fn test_rate_limited_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"items":[1,2]}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let throttler = fast_throttler(3);
    let response = assert_ok!(throttler.dispatch(get(&mock_server, "/api/items")).await);

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["items"][1], 2);
}

#[tokio::test]
async fn test_marker_body_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/quota"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"error":"rate limit exceeded"}"#),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/quota"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fresh data"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let throttler = fast_throttler(3);
    let response = assert_ok!(throttler.dispatch(get(&mock_server, "/quota")).await);
    assert_eq!(response.text().await.unwrap(), "fresh data");
}

#[tokio::test]
async fn test_bad_gateway_until_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&mock_server)
        .await;

    let throttler = fast_throttler(4);
    let err = assert_err!(throttler.dispatch(get(&mock_server, "/flaky")).await);
    assert!(matches!(err, Error::RetriesExceeded { retry_limit: 4 }));
}

#[tokio::test]
async fn test_other_errors_delivered_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let throttler = fast_throttler(3);
    let response = assert_ok!(throttler.dispatch(get(&mock_server, "/broken")).await);
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "boom");
}

#[tokio::test]
async fn test_body_passed_through_unchanged() {
    let mock_server = MockServer::start().await;
    let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&mock_server)
        .await;

    let throttler = fast_throttler(1);
    let response = assert_ok!(throttler.dispatch(get(&mock_server, "/blob")).await);
    assert_eq!(response.bytes().await.unwrap().as_ref(), payload.as_slice());
}

#[tokio::test]
async fn test_post_body_replayed_on_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string("name=test"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(body_string("name=test"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut request = Request::new(
        Method::POST,
        Url::parse(&format!("{}/items", mock_server.uri())).unwrap(),
    );
    *request.body_mut() = Some("name=test".into());

    let throttler = fast_throttler(2);
    let response = assert_ok!(throttler.dispatch(request).await);
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_connection_refused_exhausts_retries() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let throttler = fast_throttler(2);
    let request = Request::new(
        Method::GET,
        Url::parse(&format!("http://{addr}/")).unwrap(),
    );
    let err = assert_err!(throttler.dispatch(request).await);
    assert!(matches!(err, Error::RetriesExceeded { retry_limit: 2 }));
}

// ============================================================================
// Pacing
// ============================================================================

#[tokio::test]
async fn test_concurrent_dispatches_are_paced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(5)
        .mount(&mock_server)
        .await;

    // 20 rps: the fifth permit is due 250ms after construction
    let throttler = Throttler::new(20, 1).unwrap();
    let started = Instant::now();

    let calls = (0..5).map(|_| {
        let throttler = throttler.clone();
        let request = get(&mock_server, "/paced");
        async move { throttler.dispatch(request).await }
    });
    for result in futures::future::join_all(calls).await {
        assert_eq!(result.unwrap().status(), StatusCode::OK);
    }

    assert!(started.elapsed() >= Duration::from_millis(240));
}

#[tokio::test]
async fn test_cancel_abandons_backoff() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    // default backoff sleeps a full second after the first attempt
    let throttler = Throttler::new(1_000, 3).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = assert_err!(
        throttler
            .dispatch_with_cancel(get(&mock_server, "/busy"), &cancel)
            .await
    );
    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_millis(900));
}

// ============================================================================
// Config and tower integration
// ============================================================================

#[tokio::test]
async fn test_throttler_from_yaml_file() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("slow down"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("throttler.yaml");
    std::fs::write(
        &config_path,
        r#"
requests_per_second: 500
retry_limit: 2
retry_marker: "slow down"
backoff:
  initial_ms: 5
  max_ms: 50
gate:
  kind: token_bucket
  burst: 2
transport:
  user_agent: "integration/1.0"
"#,
    )
    .unwrap();

    let config = ThrottlerConfig::load(&config_path).unwrap();
    let throttler = Throttler::from_config(&config).unwrap();
    assert_eq!(throttler.retry_marker(), Some("slow down"));

    let response = assert_ok!(throttler.dispatch(get(&mock_server, "/")).await);
    assert_eq!(response.text().await.unwrap(), "done");
}

#[tokio::test]
async fn test_tower_layer_over_reqwest() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/svc"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/svc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("via tower"))
        .mount(&mock_server)
        .await;

    let config = ThrottlerConfig {
        requests_per_second: 1_000,
        backoff: throttler::BackoffConfig {
            initial_ms: 10,
            max_ms: 100,
            overflow: BackoffOverflow::Cap,
        },
        ..ThrottlerConfig::default()
    };
    let layer = ThrottleLayer::new(&config).unwrap();
    let service = layer.layer(Arc::new(ReqwestTransport::new().unwrap()));

    let response = assert_ok!(service.oneshot(get(&mock_server, "/svc")).await);
    assert_eq!(response.text().await.unwrap(), "via tower");
}

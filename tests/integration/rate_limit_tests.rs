//! Rate limiting as seen over HTTP.
//!
//! Requests use an invalid query so the limiter is exercised without doing any
//! resize work: a 400 means the request got past the limiter.

use axum::body::Body;
use axum::http::{header, HeaderName, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use antman_proxy::{ClientIdentity, RateLimitConfig, RouterConfig};

use super::test_utils::*;

/// Three requests of burst, one token every 16 seconds.
fn tight_limits() -> RateLimitConfig {
    RateLimitConfig::new(3.0, 0.0625)
}

fn cheap_request() -> Request<Body> {
    resize_request(&[("width", "10")])
}

#[tokio::test]
async fn test_burst_then_429() {
    let app = TestApp::with_config(tight_limits(), RouterConfig::new());

    for _ in 0..3 {
        let response = app.router.clone().oneshot(cheap_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app.router.oneshot(cheap_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "3");
    assert_eq!(response.headers().get("x-ratelimit-reset").unwrap(), "16");
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Rate limit exceeded");
    assert_eq!(json["retry_after"], "16s");
}

#[tokio::test]
async fn test_rejected_requests_never_reach_the_source() {
    let app = TestApp::with_config(RateLimitConfig::new(1.0, 0.0625), RouterConfig::new());
    let params = [("url", CAT_URL), ("width", "10")];

    let response = app
        .router
        .clone()
        .oneshot(resize_request(&params))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .oneshot(resize_request(&[("url", CAT_URL), ("width", "20")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    assert_eq!(app.source.total_fetches(), 1);
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let app = TestApp::with_config(RateLimitConfig::new(1.0, 0.0625), RouterConfig::new());

    let response = app.router.clone().oneshot(cheap_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = app.router.clone().oneshot(cheap_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    for _ in 0..5 {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_peers_have_separate_buckets() {
    let app = TestApp::with_config(RateLimitConfig::new(1.0, 0.0625), RouterConfig::new());

    let first = from_peer(cheap_request(), "10.0.0.1:5000");
    let response = app.router.clone().oneshot(first).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Same IP, different source port: same client
    let again = from_peer(cheap_request(), "10.0.0.1:6000");
    let response = app.router.clone().oneshot(again).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = from_peer(cheap_request(), "10.0.0.2:5000");
    let response = app.router.oneshot(other).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_requests_without_peer_share_a_bucket() {
    let app = TestApp::with_config(RateLimitConfig::new(2.0, 0.0625), RouterConfig::new());

    let statuses = {
        let mut statuses = Vec::new();
        for _ in 0..3 {
            let response = app.router.clone().oneshot(cheap_request()).await.unwrap();
            statuses.push(response.status());
        }
        statuses
    };

    assert_eq!(
        statuses,
        vec![
            StatusCode::BAD_REQUEST,
            StatusCode::BAD_REQUEST,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );
}

#[tokio::test]
async fn test_header_identity() {
    let identity = ClientIdentity::Header(HeaderName::from_static("x-api-key"));
    let app = TestApp::with_config(
        RateLimitConfig::new(1.0, 0.0625),
        RouterConfig::new().with_client_identity(identity),
    );

    let keyed = |key: &str| {
        let mut request = cheap_request();
        request
            .headers_mut()
            .insert("x-api-key", key.parse().unwrap());
        request
    };

    let response = app.router.clone().oneshot(keyed("alpha")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = app.router.clone().oneshot(keyed("alpha")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app.router.clone().oneshot(keyed("beta")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No header: falls back to the peer address
    let response = app
        .router
        .oneshot(from_peer(cheap_request(), "192.168.1.7:1234"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

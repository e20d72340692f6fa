//! End-to-end tests for the resize API.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use antman_proxy::RouterConfig;

use super::test_utils::*;

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn error_message(response: axum::response::Response) -> String {
    let body = body_bytes(response).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    json["error"].as_str().unwrap().to_string()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/thumbnail")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Resize
// =============================================================================

#[tokio::test]
async fn test_resize_defaults_to_jpeg() {
    let app = TestApp::new();

    let response = app
        .router
        .oneshot(resize_request(&[("url", CAT_URL), ("width", "100")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/jpeg");
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=31536000, immutable"
    );
    assert_eq!(
        headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
    assert_eq!(headers.get("x-cache-hit").unwrap(), "false");

    let etag = headers.get(header::ETAG).unwrap().to_str().unwrap();
    assert!(etag.starts_with("W/\""), "unexpected etag {}", etag);
    assert!(etag.ends_with('"'));

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body));
    assert_eq!(image_dimensions(&body), (100, 50));
}

#[tokio::test]
async fn test_resize_by_height_keeps_aspect_ratio() {
    let app = TestApp::new();

    let response = app
        .router
        .oneshot(resize_request(&[("url", CAT_URL), ("height", "25")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert_eq!(image_dimensions(&body), (50, 25));
}

#[tokio::test]
async fn test_resize_exact_dimensions() {
    let app = TestApp::new();

    let response = app
        .router
        .oneshot(resize_request(&[
            ("url", CAT_URL),
            ("width", "30"),
            ("height", "60"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert_eq!(image_dimensions(&body), (30, 60));
}

#[tokio::test]
async fn test_resize_png_and_webp() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(resize_request(&[
            ("url", LOGO_URL),
            ("width", "32"),
            ("format", "png"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    let body = body_bytes(response).await;
    assert!(is_valid_png(&body));
    assert_eq!(image_dimensions(&body), (32, 32));

    let response = app
        .router
        .oneshot(resize_request(&[
            ("url", LOGO_URL),
            ("width", "32"),
            ("format", "webp"),
            ("quality", "50"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/webp"
    );
    let body = body_bytes(response).await;
    assert!(is_valid_webp(&body));
}

#[tokio::test]
async fn test_second_request_is_served_from_cache() {
    let app = TestApp::new();
    let params = [("url", CAT_URL), ("width", "80")];

    let first = app
        .router
        .clone()
        .oneshot(resize_request(&params))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-cache-hit").unwrap(), "false");
    let first_etag = first.headers().get(header::ETAG).unwrap().clone();
    let first_body = body_bytes(first).await;

    let second = app
        .router
        .oneshot(resize_request(&params))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get("x-cache-hit").unwrap(), "true");
    assert_eq!(second.headers().get(header::ETAG).unwrap(), &first_etag);
    assert_eq!(body_bytes(second).await, first_body);

    assert_eq!(app.source.fetch_count(CAT_URL), 1);
}

#[tokio::test]
async fn test_artifact_written_to_cache_dir() {
    let app = TestApp::new();

    let response = app
        .router
        .oneshot(resize_request(&[
            ("url", CAT_URL),
            ("width", "40"),
            ("format", "png"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let fp = antman_proxy::fingerprint(CAT_URL, 40, 0, antman_proxy::OutputFormat::Png);
    assert!(app.cache_dir.path().join(format!("{}.png", fp)).exists());
}

#[tokio::test]
async fn test_quality_does_not_split_cache() {
    let app = TestApp::new();

    for quality in ["20", "95"] {
        let response = app
            .router
            .clone()
            .oneshot(resize_request(&[
                ("url", CAT_URL),
                ("width", "60"),
                ("quality", quality),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(app.source.fetch_count(CAT_URL), 1);
}

// =============================================================================
// Conditional Requests
// =============================================================================

#[tokio::test]
async fn test_matching_if_none_match_returns_304() {
    let app = TestApp::new();
    let params = [("url", CAT_URL), ("width", "50")];

    let first = app
        .router
        .clone()
        .oneshot(resize_request(&params))
        .await
        .unwrap();
    let etag = first.headers().get(header::ETAG).unwrap().clone();

    let request = Request::builder()
        .uri(resize_uri(&params))
        .header(header::IF_NONE_MATCH, etag.clone())
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers().get(header::ETAG).unwrap(), &etag);
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_stale_if_none_match_returns_200() {
    let app = TestApp::new();
    let params = [("url", CAT_URL), ("width", "50")];

    let request = Request::builder()
        .uri(resize_uri(&params))
        .header(header::IF_NONE_MATCH, "W/\"1\"")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(is_valid_jpeg(&body_bytes(response).await));
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_validation_errors_over_http() {
    let cases: &[(&[(&str, &str)], &str)] = &[
        (&[("width", "100")], "Missing URL parameter"),
        (
            &[("url", "https://example.com/a.jpg"), ("width", "100")],
            "Invalid URL domain",
        ),
        (&[("url", CAT_URL)], "At least one of width or height must be specified"),
        (
            &[("url", CAT_URL), ("width", "2001")],
            "Dimensions must be in the range 1-2000",
        ),
        (
            &[("url", CAT_URL), ("width", "100"), ("format", "gif")],
            "Format must be one of jpeg, png, webp",
        ),
        (
            &[("url", CAT_URL), ("width", "100"), ("quality", "101")],
            "Quality must be between 1 and 100",
        ),
    ];

    let app = TestApp::new();

    for (params, expected) in cases {
        let response = app
            .router
            .clone()
            .oneshot(resize_request(params))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{:?}", params);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(&error_message(response).await, expected);
    }

    assert_eq!(app.source.total_fetches(), 0);
}

#[tokio::test]
async fn test_missing_query_string_is_missing_url() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/resize")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "Missing URL parameter");
}

#[tokio::test]
async fn test_upstream_404_is_400() {
    let app = TestApp::new();
    let url = "https://imgur.com/missing.jpg";

    let response = app
        .router
        .oneshot(resize_request(&[("url", url), ("width", "100")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let message = error_message(response).await;
    assert!(message.contains("404"), "unexpected message: {}", message);
}

#[tokio::test]
async fn test_undecodable_source_is_400_and_not_cached() {
    let app = TestApp::new();
    let url = "https://imgur.com/notes.txt";

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(resize_request(&[("url", url), ("width", "100")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let message = error_message(response).await;
        assert!(message.starts_with("failed to decode image"), "{}", message);
    }

    assert_eq!(app.source.fetch_count(url), 2);
}

// =============================================================================
// Router Configuration
// =============================================================================

#[tokio::test]
async fn test_configured_cache_max_age() {
    let app = TestApp::with_config(
        antman_proxy::RateLimitConfig::default(),
        RouterConfig::new().with_cache_max_age(600),
    );

    let response = app
        .router
        .oneshot(resize_request(&[("url", CAT_URL), ("width", "10")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=600, immutable"
    );
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = TestApp::new();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/resize")
        .header(header::ORIGIN, "https://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

//! HTTP request handlers for the resize API.
//!
//! # Endpoints
//!
//! - `GET /resize?url=&width=&height=&format=&quality=` - Serve a resized image
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::{CacheError, GatewayError};
use crate::gateway::{ResizeGateway, ResizeQueryParams};
use crate::pipeline::ImageSource;

/// Reports whether the artifact was served from cache.
pub const X_CACHE_HIT: HeaderName = HeaderName::from_static("x-cache-hit");

/// Cache lifetime for shared caches in front of the service.
pub const CDN_CACHE_CONTROL: HeaderName = HeaderName::from_static("cdn-cache-control");

/// Default `Cache-Control` max-age for resized images: one year.
pub const DEFAULT_HTTP_CACHE_MAX_AGE: u64 = 31_536_000;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the resize gateway.
pub struct AppState<S> {
    pub gateway: Arc<ResizeGateway<S>>,

    /// `Cache-Control` max-age in seconds for successful responses
    pub cache_max_age: u64,
}

impl<S: ImageSource + 'static> AppState<S> {
    pub fn new(gateway: ResizeGateway<S>) -> Self {
        Self::with_cache_max_age(gateway, DEFAULT_HTTP_CACHE_MAX_AGE)
    }

    pub fn with_cache_max_age(gateway: ResizeGateway<S>, cache_max_age: u64) -> Self {
        Self {
            gateway: Arc::new(gateway),
            cache_max_age,
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error body: `{"error": "<message>"}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert GatewayError to HTTP response.
///
/// Request and processing failures are the client's problem (400, logged at
/// WARN). A job that panicked or never ran is ours (500, logged at ERROR).
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Validation(_) | GatewayError::Process(_) => StatusCode::BAD_REQUEST,
            GatewayError::Job(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Server error");
        } else {
            warn!(status = status.as_u16(), error = %message, "Client error");
        }

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle resize requests.
///
/// # Endpoint
///
/// `GET /resize?url=<source>&width=<px>&height=<px>&format=<jpeg|png|webp>&quality=<1-100>`
///
/// # Response
///
/// - `200 OK` with the image and `Content-Type`, `ETag`, `Cache-Control`,
///   `X-Cache-Hit` headers
/// - `304 Not Modified` when `If-None-Match` equals the current ETag
/// - `400 Bad Request` with `{"error": ...}` for invalid input or a failed resize
/// - `500 Internal Server Error` if the resize job crashed
pub async fn resize_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Query(params): Query<ResizeQueryParams>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let image = state.gateway.resize(&params).await?;

    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .is_some_and(|value| value.as_bytes() == image.etag.as_bytes());
    if not_modified {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, image.etag)]).into_response());
    }

    let body = tokio::fs::read(&image.path)
        .await
        .map_err(|e| CacheError::Read {
            path: image.path.display().to_string(),
            message: e.to_string(),
        })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, image.format.mime_type().to_string()),
            (header::ETAG, image.etag),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}, immutable", state.cache_max_age),
            ),
            (CDN_CACHE_CONTROL, format!("max-age={}", state.cache_max_age)),
            (header::VARY, "Accept-Encoding".to_string()),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
            (X_CACHE_HIT, image.cache_hit.to_string()),
        ],
        body,
    )
        .into_response())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

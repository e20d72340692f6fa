//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health                                      - Health check (public)
//! /resize?url=&width=&height=&format=&quality= - Resize endpoint (rate limited)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use antman_proxy::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(gateway, limiter, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

use std::time::Duration;

use axum::{middleware, routing::get, Router};
use http::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, resize_handler, AppState, DEFAULT_HTTP_CACHE_MAX_AGE, X_CACHE_HIT,
};
use super::rate_limit::{
    rate_limit_middleware, ClientIdentity, RateLimitState, X_RATELIMIT_LIMIT, X_RATELIMIT_RESET,
};
use crate::gateway::ResizeGateway;
use crate::limit::RateLimiter;
use crate::pipeline::ImageSource;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds for resized images
    pub cache_max_age: u64,

    /// How requests are assigned to rate-limit buckets
    pub client_identity: ClientIdentity,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is one year
    /// - Clients are identified by peer IP
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_HTTP_CACHE_MAX_AGE,
            client_identity: ClientIdentity::PeerAddr,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u64) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_client_identity(mut self, identity: ClientIdentity) -> Self {
        self.client_identity = identity;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// `/resize` sits behind the rate limiter; `/health` does not. CORS applies to
/// both, and request tracing is added when enabled.
pub fn create_router<S>(
    gateway: ResizeGateway<S>,
    limiter: RateLimiter,
    config: RouterConfig,
) -> Router
where
    S: ImageSource + 'static,
{
    let app_state = AppState::with_cache_max_age(gateway, config.cache_max_age);
    let rate_limit = RateLimitState::new(limiter, config.client_identity.clone());
    let cors = build_cors_layer(&config);

    let limited_routes = Router::new()
        .route("/resize", get(resize_handler::<S>))
        .with_state(app_state)
        .layer(middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));

    let public_routes = Router::new().route("/health", get(health_handler));

    let router = Router::new()
        .merge(limited_routes)
        .merge(public_routes)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, IF_NONE_MATCH])
        .expose_headers([ETAG, X_CACHE_HIT, X_RATELIMIT_LIMIT, X_RATELIMIT_RESET])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

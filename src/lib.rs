//! # antman-proxy
//!
//! An on-demand image resizing proxy.
//!
//! Clients ask for `/resize?url=...&width=...`; the proxy fetches the source
//! from an allow-listed host, resizes it with Lanczos3, re-encodes it as JPEG,
//! PNG or WebP, and serves the result from a content-addressed disk cache.
//!
//! ## Features
//!
//! - **Per-client rate limiting**: token buckets keyed by IP or a request header
//! - **Bounded concurrency**: a fixed worker pool with a bounded queue and panic isolation
//! - **Disk cache**: deterministic file names with time-based expiry, survives restarts
//! - **Conditional GET**: weak ETags from the artifact's modification time
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`limit`] - Token-bucket rate limiter
//! - [`pool`] - Worker pool for resize jobs
//! - [`cache`] - Content-addressed artifact cache
//! - [`pipeline`] - Fetch, decode, resize and encode
//! - [`gateway`] - Request validation and scheduling
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use antman_proxy::{
//!     create_router, DomainAllowList, GatewaySettings, HttpImageSource, ImageCache,
//!     ImagePipeline, RateLimitConfig, RateLimiter, ResizeGateway, RouterConfig, WorkerPool,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let allow_list = DomainAllowList::from_csv("imgur.com,unsplash.com");
//!     let cache = ImageCache::open("image_cache", Duration::from_secs(86_400))
//!         .await
//!         .unwrap();
//!     let source = HttpImageSource::new(Duration::from_secs(30)).unwrap();
//!
//!     let pipeline = ImagePipeline::new(source, cache, allow_list.clone());
//!     let pool = Arc::new(WorkerPool::new(8));
//!     let gateway = ResizeGateway::new(pipeline, pool, GatewaySettings::new(allow_list));
//!
//!     let router = create_router(
//!         gateway,
//!         RateLimiter::new(RateLimitConfig::default()),
//!         RouterConfig::new(),
//!     );
//!
//!     // Serve the router...
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod gateway;
pub mod limit;
pub mod pipeline;
pub mod pool;
pub mod server;

// Re-export commonly used types
pub use cache::{fingerprint, ImageCache, DEFAULT_CACHE_DIR, DEFAULT_CACHE_MAX_AGE};
pub use config::Config;
pub use error::{CacheError, FetchError, GatewayError, JobError, ProcessError, ValidationError};
pub use format::OutputFormat;
pub use gateway::{weak_etag, GatewaySettings, ResizeGateway, ResizeQueryParams, ResizedImage};
pub use limit::{RateLimitConfig, RateLimitExceeded, RateLimiter, TokenBucket};
pub use pipeline::{
    target_dimensions, DomainAllowList, HttpImageSource, ImagePipeline, ImageSource,
    ProcessedImage, ResizeRequest,
};
pub use pool::{JobHandle, WorkerPool};
pub use server::{
    create_router, health_handler, resize_handler, AppState, ClientIdentity, ErrorResponse,
    HealthResponse, RouterConfig,
};

//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │          GET /resize?url=&width=&height=&format=&quality=       │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │ rate_limit  │  │        routes           │  │
//! │  │ (requests)  │  │ (per client)│  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                        ResizeGateway
//! ```

pub mod handlers;
pub mod rate_limit;
pub mod routes;

pub use handlers::{
    health_handler, resize_handler, AppState, ErrorResponse, HealthResponse,
    DEFAULT_HTTP_CACHE_MAX_AGE, X_CACHE_HIT,
};
pub use rate_limit::{
    format_duration, rate_limit_middleware, ClientIdentity, RateLimitResponse, RateLimitState,
    UNKNOWN_CLIENT, X_RATELIMIT_LIMIT, X_RATELIMIT_RESET,
};
pub use routes::{create_router, RouterConfig};

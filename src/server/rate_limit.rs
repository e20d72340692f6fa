//! Per-client rate limiting middleware.
//!
//! Every request to a limited route costs one token from its client's
//! bucket. When the bucket is empty the request is answered immediately:
//!
//! ```text
//! HTTP/1.1 429 Too Many Requests
//! X-RateLimit-Limit: 60
//! X-RateLimit-Reset: 1
//!
//! {"error": "Rate limit exceeded", "retry_after": "1s"}
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::limit::{RateLimitExceeded, RateLimiter};

/// Identity shared by requests whose peer address is unknown.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Header carrying the bucket capacity on a 429.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");

/// Header carrying the seconds until a token is available on a 429.
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

type IdentityFn = dyn Fn(&Request) -> Option<String> + Send + Sync;

// =============================================================================
// Client Identity
// =============================================================================

/// How a request is mapped to a rate-limit bucket.
#[derive(Clone, Default)]
pub enum ClientIdentity {
    /// Remote IP address of the connection.
    #[default]
    PeerAddr,

    /// Value of a request header such as `x-api-key`, falling back to the
    /// peer address when the header is absent or not valid text.
    Header(HeaderName),

    /// Arbitrary extraction; `None` falls back to the peer address.
    Custom(Arc<IdentityFn>),
}

impl ClientIdentity {
    /// Identify clients with a custom function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Request) -> Option<String> + Send + Sync + 'static,
    {
        ClientIdentity::Custom(Arc::new(f))
    }

    /// Bucket key for `request`.
    pub fn identify(&self, request: &Request) -> String {
        let explicit = match self {
            ClientIdentity::PeerAddr => None,
            ClientIdentity::Header(name) => request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            ClientIdentity::Custom(f) => f(request),
        };

        explicit.unwrap_or_else(|| peer_ip(request))
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdentity::PeerAddr => f.write_str("PeerAddr"),
            ClientIdentity::Header(name) => f.debug_tuple("Header").field(name).finish(),
            ClientIdentity::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn peer_ip(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

// =============================================================================
// Middleware
// =============================================================================

/// State for [`rate_limit_middleware`].
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub identity: ClientIdentity,
}

impl RateLimitState {
    pub fn new(limiter: RateLimiter, identity: ClientIdentity) -> Self {
        Self {
            limiter: Arc::new(limiter),
            identity,
        }
    }
}

/// Reject the request with 429 when its client has no tokens left.
///
/// # Usage
///
/// ```ignore
/// let state = RateLimitState::new(RateLimiter::new(RateLimitConfig::default()), ClientIdentity::PeerAddr);
/// let app = Router::new()
///     .route("/resize", get(resize_handler))
///     .layer(middleware::from_fn_with_state(state, rate_limit_middleware));
/// ```
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    let client = state.identity.identify(&request);
    state.limiter.check(&client)?;

    Ok(next.run(request).await)
}

// =============================================================================
// 429 Response
// =============================================================================

/// JSON body of a 429 response.
#[derive(Debug, Serialize)]
pub struct RateLimitResponse {
    pub error: String,
    pub retry_after: String,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let body = RateLimitResponse {
            error: "Rate limit exceeded".to_string(),
            retry_after: format_duration(self.retry_after),
        };

        (
            StatusCode::TOO_MANY_REQUESTS,
            [
                (X_RATELIMIT_LIMIT, format!("{:.0}", self.limit)),
                (
                    X_RATELIMIT_RESET,
                    format!("{:.0}", self.retry_after.as_secs_f64()),
                ),
            ],
            Json(body),
        )
            .into_response()
    }
}

/// Render a duration in compact unit notation: `1s`, `500ms`,
/// `1.5s`, `1m30s`, `2h0m0s`.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();

    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 1_000));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos, 1_000_000));
    }

    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs_nanos =
        u128::from(total_secs % 60) * 1_000_000_000 + u128::from(duration.subsec_nanos());

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&format!("{}s", decimal(secs_nanos, 1_000_000_000)));
    out
}

/// `value / unit` with the fractional part printed without trailing zeros.
fn decimal(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let fraction = value % unit;
    if fraction == 0 {
        return whole.to_string();
    }

    let digits = unit.ilog10() as usize;
    let fraction = format!("{:0width$}", fraction, width = digits);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

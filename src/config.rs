//! Configuration management.
//!
//! Settings come from command-line arguments via clap, with each option also
//! readable from an environment variable and falling back to a default.
//!
//! # Example
//!
//! ```ignore
//! use antman_proxy::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `HOST` - Server bind address (default: 0.0.0.0)
//! - `PORT` - Server port (default: 8080)
//! - `ALLOWED_DOMAINS` - Comma-separated source hosts (required)
//! - `VALID_FORMATS` - Comma-separated output formats (default: jpeg,png,webp)
//! - `DEFAULT_QUALITY` - Quality when a request names none (default: 85)
//! - `CACHE_DIR` - Artifact directory (default: image_cache)
//! - `CACHE_MAX_AGE` - Artifact lifetime in seconds (default: 86400)
//! - `REQUEST_CAPACITY` - Rate-limit burst per client (default: 60)
//! - `REQUEST_REFILL_RATE` - Tokens per second per client (default: 1)
//! - `RATE_LIMIT_MAX_CLIENTS` - Clients tracked before eviction (default: 10000)
//! - `CLIENT_ID_HEADER` - Header identifying clients (default: peer address)
//! - `WORKER_POOL_SIZE` - Concurrent resize jobs (default: 8)
//! - `FETCH_TIMEOUT` - Upstream fetch timeout in seconds (default: 30)
//! - `JOB_TIMEOUT` - Fetch-and-resize deadline in seconds (default: 60)
//! - `HTTP_CACHE_MAX_AGE` - Cache-Control max-age seconds (default: 31536000)
//! - `CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use http::HeaderName;

use crate::cache::{DEFAULT_CACHE_DIR, DEFAULT_CACHE_MAX_AGE};
use crate::format::OutputFormat;
use crate::limit::{RateLimitConfig, DEFAULT_CAPACITY, DEFAULT_MAX_CLIENTS, DEFAULT_REFILL_RATE};
use crate::pipeline::{
    is_valid_quality, DomainAllowList, DEFAULT_FETCH_TIMEOUT, DEFAULT_JOB_TIMEOUT, DEFAULT_QUALITY,
};
use crate::pool::DEFAULT_POOL_SIZE;
use crate::server::{ClientIdentity, DEFAULT_HTTP_CACHE_MAX_AGE};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default set of accepted output formats.
pub const DEFAULT_VALID_FORMATS: &str = "jpeg,png,webp";

// =============================================================================
// CLI Arguments
// =============================================================================

/// antman-proxy - An on-demand image resizing proxy.
///
/// Fetches images from allow-listed hosts, resizes and re-encodes them, and
/// serves the results from a local disk cache.
#[derive(Parser, Debug, Clone)]
#[command(name = "antman-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    // =========================================================================
    // Request Policy
    // =========================================================================
    /// Hosts images may be fetched from (comma-separated, substring match).
    #[arg(long, env = "ALLOWED_DOMAINS", value_delimiter = ',', required = true)]
    pub allowed_domains: Vec<String>,

    /// Output formats clients may request (comma-separated).
    #[arg(
        long,
        env = "VALID_FORMATS",
        value_delimiter = ',',
        default_value = DEFAULT_VALID_FORMATS
    )]
    pub valid_formats: Vec<String>,

    /// Quality used when a request does not specify one (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "DEFAULT_QUALITY")]
    pub default_quality: u8,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Directory holding resized images.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Seconds a resized image stays servable before it is regenerated.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE.as_secs(), env = "CACHE_MAX_AGE")]
    pub cache_max_age: u64,

    // =========================================================================
    // Rate Limiting
    // =========================================================================
    /// Maximum burst of requests per client.
    #[arg(long, default_value_t = DEFAULT_CAPACITY, env = "REQUEST_CAPACITY")]
    pub request_capacity: f64,

    /// Requests per second regained by each client.
    #[arg(long, default_value_t = DEFAULT_REFILL_RATE, env = "REQUEST_REFILL_RATE")]
    pub request_refill_rate: f64,

    /// Number of clients tracked before the least recently seen is forgotten.
    #[arg(long, default_value_t = DEFAULT_MAX_CLIENTS, env = "RATE_LIMIT_MAX_CLIENTS")]
    pub max_clients: usize,

    /// Request header identifying clients, such as `x-api-key`.
    ///
    /// If not specified, clients are identified by their IP address.
    #[arg(long, env = "CLIENT_ID_HEADER")]
    pub client_id_header: Option<String>,

    // =========================================================================
    // Processing
    // =========================================================================
    /// Number of resize jobs run concurrently.
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, env = "WORKER_POOL_SIZE")]
    pub workers: usize,

    /// Upstream fetch timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT.as_secs(), env = "FETCH_TIMEOUT")]
    pub fetch_timeout: u64,

    /// Deadline in seconds for fetching and resizing one image.
    #[arg(long, default_value_t = DEFAULT_JOB_TIMEOUT.as_secs(), env = "JOB_TIMEOUT")]
    pub job_timeout: u64,

    // =========================================================================
    // HTTP Caching and CORS
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_HTTP_CACHE_MAX_AGE, env = "HTTP_CACHE_MAX_AGE")]
    pub http_cache_max_age: u64,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.allow_list().is_empty() {
            return Err(
                "At least one allowed domain is required. Set --allowed-domains or ALLOWED_DOMAINS"
                    .to_string(),
            );
        }

        self.output_formats()?;

        if !is_valid_quality(self.default_quality) {
            return Err("default_quality must be between 1 and 100".to_string());
        }

        if !(self.request_capacity.is_finite() && self.request_capacity > 0.0) {
            return Err("request_capacity must be greater than 0".to_string());
        }
        if !(self.request_refill_rate.is_finite() && self.request_refill_rate > 0.0) {
            return Err("request_refill_rate must be greater than 0".to_string());
        }
        if self.max_clients == 0 {
            return Err("max_clients must be greater than 0".to_string());
        }

        self.client_identity()?;

        if self.fetch_timeout == 0 {
            return Err("fetch_timeout must be greater than 0".to_string());
        }
        if self.job_timeout == 0 {
            return Err("job_timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allow_list(&self) -> DomainAllowList {
        DomainAllowList::new(&self.allowed_domains)
    }

    /// Parse the configured output formats, rejecting unknown or empty lists.
    pub fn output_formats(&self) -> Result<Vec<OutputFormat>, String> {
        let mut formats = Vec::new();
        for name in self.valid_formats.iter().map(|name| name.trim()) {
            if name.is_empty() {
                continue;
            }
            let format = name
                .parse::<OutputFormat>()
                .map_err(|e| format!("valid_formats: {}", e))?;
            if !formats.contains(&format) {
                formats.push(format);
            }
        }

        if formats.is_empty() {
            return Err("valid_formats must name at least one of jpeg, png, webp".to_string());
        }
        Ok(formats)
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.request_capacity, self.request_refill_rate)
            .with_max_clients(self.max_clients)
    }

    /// How clients are told apart for rate limiting.
    pub fn client_identity(&self) -> Result<ClientIdentity, String> {
        match &self.client_id_header {
            None => Ok(ClientIdentity::PeerAddr),
            Some(name) if name.trim().is_empty() => Ok(ClientIdentity::PeerAddr),
            Some(name) => HeaderName::try_from(name.trim())
                .map(ClientIdentity::Header)
                .map_err(|_| format!("client_id_header is not a valid header name: {}", name)),
        }
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout)
    }
}

// =============================================================================
// Tests
// =============================================================================

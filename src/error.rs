use std::time::Duration;

use thiserror::Error;

use crate::format::OutputFormat;

/// Request parameters rejected before any work is scheduled.
///
/// The display strings are returned verbatim to HTTP clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing URL parameter")]
    MissingUrl,

    #[error("Invalid URL domain")]
    InvalidDomain,

    #[error("At least one of width or height must be specified")]
    MissingDimensions,

    #[error("Dimensions must be in the range 1-2000")]
    DimensionsOutOfRange,

    #[error("Format must be one of jpeg, png, webp")]
    InvalidFormat,

    #[error("Quality must be between 1 and 100")]
    InvalidQuality,
}

/// Errors from retrieving the upstream image.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or timeout failure
    #[error("failed to fetch {url}: {message}")]
    Transport { url: String, message: String },

    /// Upstream answered with a non-2xx status
    #[error("upstream returned {status} for {url}")]
    Status { url: String, status: u16 },

    /// The response body could not be read to completion
    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Errors from the on-disk artifact cache.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("failed to create cache directory {path}: {message}")]
    CreateDir { path: String, message: String },

    #[error("failed to write cache entry {path}: {message}")]
    Write { path: String, message: String },

    #[error("failed to read cache entry {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to stat cache entry {path}: {message}")]
    Metadata { path: String, message: String },
}

/// Errors raised while turning a resize request into a cached artifact.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// Source URL host is not on the allow-list
    #[error("Invalid URL domain")]
    InvalidDomain,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Fetched bytes are not a recognized image
    #[error("failed to decode image: {message}")]
    Decode { message: String },

    #[error("failed to encode {format}: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("image processing exceeded the {}s deadline", .0.as_secs())]
    DeadlineExceeded(Duration),

    /// The blocking transform task was torn down before finishing
    #[error("image transform task failed: {0}")]
    Transform(String),
}

/// Failures of the execution envelope around a job, as opposed to the job's own result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job panicked: {0}")]
    Panicked(String),

    /// The pool shut down while the job was still queued
    #[error("job was abandoned before it started")]
    Abandoned,

    #[error("worker pool is shut down")]
    ShutDown,
}

/// Everything the resize gateway can hand back to the HTTP layer.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Job(#[from] JobError),
}

impl From<CacheError> for GatewayError {
    fn from(err: CacheError) -> Self {
        GatewayError::Process(ProcessError::Cache(err))
    }
}

//! Read-through resize pipeline.
//!
//! ```text
//! ResizeRequest ──► allow-list ──► fingerprint ──► cache lookup ──hit──► path
//!                                                      │
//!                                                     miss
//!                                                      ▼
//!                        fetch ──► spawn_blocking(decode ─► resize ─► encode) ──► cache store ──► path
//! ```

use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::allow_list::DomainAllowList;
use super::encoder;
use super::request::ResizeRequest;
use super::source::ImageSource;
use crate::cache::ImageCache;
use crate::error::ProcessError;

/// Default upper bound on a single fetch-and-transform.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of a successful [`ImagePipeline::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    /// Cached artifact on disk
    pub path: PathBuf,

    /// Whether the artifact was already cached
    pub cache_hit: bool,
}

// =============================================================================
// Image Pipeline
// =============================================================================

/// Turns resize requests into cached artifacts.
///
/// Generic over the [`ImageSource`] so tests can substitute an in-memory
/// source for HTTP.
pub struct ImagePipeline<S> {
    source: Arc<S>,
    cache: ImageCache,
    allow_list: DomainAllowList,
    job_timeout: Duration,
}

impl<S: ImageSource> ImagePipeline<S> {
    pub fn new(source: S, cache: ImageCache, allow_list: DomainAllowList) -> Self {
        Self {
            source: Arc::new(source),
            cache,
            allow_list,
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }

    /// Bound the whole fetch-and-transform by `timeout`.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Produce the artifact for `request`, serving it from cache when fresh.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::InvalidDomain`] if the URL host is not allowed
    /// - [`ProcessError::Fetch`] if the source cannot be retrieved
    /// - [`ProcessError::Decode`] / [`ProcessError::Encode`] for bad image data
    /// - [`ProcessError::DeadlineExceeded`] if the job outlives its timeout
    ///
    /// # Panics
    ///
    /// A panic inside the decoder or encoder is resumed on the calling task,
    /// where the worker pool turns it into a job error.
    pub async fn process(&self, request: &ResizeRequest) -> Result<ProcessedImage, ProcessError> {
        match tokio::time::timeout(self.job_timeout, self.process_uncapped(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    url = %request.source_url,
                    timeout_secs = self.job_timeout.as_secs(),
                    "Image processing deadline exceeded"
                );
                Err(ProcessError::DeadlineExceeded(self.job_timeout))
            }
        }
    }

    async fn process_uncapped(
        &self,
        request: &ResizeRequest,
    ) -> Result<ProcessedImage, ProcessError> {
        if !self.allow_list.is_allowed(&request.source_url) {
            return Err(ProcessError::InvalidDomain);
        }

        let fingerprint = request.fingerprint();

        if let Some(path) = self.cache.lookup(&fingerprint, request.format).await {
            return Ok(ProcessedImage {
                path,
                cache_hit: true,
            });
        }

        let source = self.source.fetch(&request.source_url).await?;
        debug!(url = %request.source_url, bytes = source.len(), "Fetched source image");

        let ResizeRequest {
            width,
            height,
            format,
            quality,
            ..
        } = *request;

        let encoded = tokio::task::spawn_blocking(move || {
            encoder::transform(&source, width, height, format, quality)
        })
        .await;

        let encoded = match encoded {
            Ok(result) => result?,
            Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
            Err(e) => return Err(ProcessError::Transform(e.to_string())),
        };

        let path = self.cache.store(&fingerprint, &encoded, format).await?;

        info!(
            url = %request.source_url,
            width,
            height,
            format = %format,
            bytes = encoded.len(),
            "Resized image"
        );

        Ok(ProcessedImage {
            path,
            cache_hit: false,
        })
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn allow_list(&self) -> &DomainAllowList {
        &self.allow_list
    }

    pub fn job_timeout(&self) -> Duration {
        self.job_timeout
    }
}

// =============================================================================
// Tests
// =============================================================================

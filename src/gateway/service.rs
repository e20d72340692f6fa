use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use super::request::{GatewaySettings, ResizeQueryParams};
use crate::cache::unix_secs;
use crate::error::{CacheError, GatewayError};
use crate::format::OutputFormat;
use crate::pipeline::{ImagePipeline, ImageSource, ResizeRequest};
use crate::pool::WorkerPool;

/// A resized image ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizedImage {
    /// Artifact on disk
    pub path: PathBuf,

    pub format: OutputFormat,

    /// Weak validator derived from the artifact's modification time
    pub etag: String,

    pub cache_hit: bool,
}

/// Weak ETag for an artifact last modified at `modified`: `W/"<unix seconds>"`.
pub fn weak_etag(modified: SystemTime) -> String {
    format!("W/\"{}\"", unix_secs(modified))
}

// =============================================================================
// Resize Gateway
// =============================================================================

/// Front door for resize requests.
///
/// Validates the request, runs the [`ImagePipeline`] on the [`WorkerPool`],
/// and describes the resulting artifact. Invalid requests are rejected
/// without taking a pool slot.
pub struct ResizeGateway<S> {
    pipeline: Arc<ImagePipeline<S>>,
    pool: Arc<WorkerPool>,
    settings: GatewaySettings,
}

impl<S: ImageSource + 'static> ResizeGateway<S> {
    pub fn new(pipeline: ImagePipeline<S>, pool: Arc<WorkerPool>, settings: GatewaySettings) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            pool,
            settings,
        }
    }

    /// Validate raw query parameters and resize.
    pub async fn resize(&self, params: &ResizeQueryParams) -> Result<ResizedImage, GatewayError> {
        let request = params.validate(&self.settings)?;
        self.resize_request(request).await
    }

    /// Resize an already validated request.
    pub async fn resize_request(&self, request: ResizeRequest) -> Result<ResizedImage, GatewayError> {
        let format = request.format;
        let pipeline = Arc::clone(&self.pipeline);

        let handle = self
            .pool
            .submit(async move { pipeline.process(&request).await })
            .await?;
        let processed = handle.join().await??;

        let metadata_error = |e: std::io::Error| CacheError::Metadata {
            path: processed.path.display().to_string(),
            message: e.to_string(),
        };
        let metadata = tokio::fs::metadata(&processed.path)
            .await
            .map_err(metadata_error)?;
        let modified = metadata.modified().map_err(metadata_error)?;

        debug!(
            path = %processed.path.display(),
            cache_hit = processed.cache_hit,
            "Resize complete"
        );

        Ok(ResizedImage {
            path: processed.path,
            format,
            etag: weak_etag(modified),
            cache_hit: processed.cache_hit,
        })
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn pipeline(&self) -> &ImagePipeline<S> {
        &self.pipeline
    }
}

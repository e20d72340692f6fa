use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::FetchError;

/// Default connect-plus-read timeout for upstream fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// ImageSource Trait
// =============================================================================

/// Where source images come from.
///
/// The pipeline only needs the raw bytes behind a URL; keeping this behind a
/// trait lets tests serve generated images without a network.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetch the full body behind `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

// =============================================================================
// HTTP Source
// =============================================================================

/// Fetches source images with a plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    /// Build a source whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        debug!(url = %url, "Fetching source image");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

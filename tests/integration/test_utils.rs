//! Shared fixtures for integration tests: an in-memory image source, test
//! image generators and a router factory.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::Router;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::TempDir;

use antman_proxy::error::FetchError;
use antman_proxy::{
    create_router, DomainAllowList, GatewaySettings, ImageCache, ImagePipeline, ImageSource,
    RateLimitConfig, RateLimiter, ResizeGateway, RouterConfig, WorkerPool,
};

// =============================================================================
// Mock Image Source
// =============================================================================

/// Serves registered images from memory and counts fetches per URL.
///
/// Unregistered URLs answer with an upstream 404.
#[derive(Clone, Default)]
pub struct MockImageSource {
    images: Arc<HashMap<String, Bytes>>,
    fetches: Arc<std::sync::Mutex<HashMap<String, usize>>>,
    total: Arc<AtomicUsize>,
}

impl MockImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` under `url`.
    pub fn with_image(mut self, url: impl Into<String>, data: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.images).insert(url.into(), Bytes::from(data));
        self
    }

    /// Number of fetches for `url`.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Number of fetches across all URLs.
    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSource for MockImageSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        self.images.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

// =============================================================================
// Test Images
// =============================================================================

/// Gradient RGB JPEG of the given size.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode_image(&img)
        .unwrap();
    buf
}

/// Half-transparent RGBA PNG of the given size.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 120, 240, 128]));

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0xFF && data[1] == 0xD8
}

pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(b"\x89PNG\r\n\x1a\n")
}

pub fn is_valid_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// Width and height of an encoded image.
pub fn image_dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

// =============================================================================
// Router Factory
// =============================================================================

/// URL of the 200x100 JPEG every test app serves.
pub const CAT_URL: &str = "https://i.imgur.com/cat.jpg";

/// URL of the 64x64 PNG every test app serves.
pub const LOGO_URL: &str = "https://imgur.com/logo.png";

/// A router over a mock source and a private cache directory.
pub struct TestApp {
    pub router: Router,
    pub source: MockImageSource,
    pub cache_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default(), RouterConfig::new())
    }

    pub fn with_config(limits: RateLimitConfig, router_config: RouterConfig) -> Self {
        let source = MockImageSource::new()
            .with_image(CAT_URL, create_test_jpeg(200, 100))
            .with_image(LOGO_URL, create_test_png(64, 64))
            .with_image("https://imgur.com/notes.txt", b"hello".to_vec());

        let cache_dir = tempfile::tempdir().unwrap();
        let allow_list = DomainAllowList::new(["imgur.com"]);

        let pipeline = ImagePipeline::new(
            source.clone(),
            ImageCache::new(cache_dir.path(), Duration::from_secs(86_400)),
            allow_list.clone(),
        );
        let gateway = ResizeGateway::new(
            pipeline,
            Arc::new(WorkerPool::new(2)),
            GatewaySettings::new(allow_list),
        );
        let router = create_router(gateway, RateLimiter::new(limits), router_config);

        Self {
            router,
            source,
            cache_dir,
        }
    }
}

/// `GET /resize` with the given query pairs, values URL-encoded.
pub fn resize_request(params: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .uri(resize_uri(params))
        .body(Body::empty())
        .unwrap()
}

pub fn resize_uri(params: &[(&str, &str)]) -> String {
    let query: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();
    format!("/resize?{}", query.join("&"))
}

/// Attach a peer address as if the request arrived over a real connection.
pub fn from_peer(mut request: Request<Body>, addr: &str) -> Request<Body> {
    let addr: SocketAddr = addr.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

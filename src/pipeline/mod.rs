//! Image fetching and transformation.
//!
//! This module turns a [`ResizeRequest`] into a file in the [`ImageCache`]:
//!
//! - [`DomainAllowList`]: which hosts may be fetched from
//! - [`ImageSource`]: how source bytes are retrieved ([`HttpImageSource`] in production)
//! - [`encoder`]: decode, Lanczos3 resize and encode to JPEG, PNG or WebP
//! - [`ImagePipeline`]: cache read-through tying the pieces together
//!
//! [`ImageCache`]: crate::cache::ImageCache

mod allow_list;
mod dimensions;
pub mod encoder;
mod request;
mod service;
mod source;

pub use allow_list::DomainAllowList;
pub use dimensions::target_dimensions;
pub use encoder::{is_valid_quality, DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY};
pub use request::{ResizeRequest, MAX_DIMENSION};
pub use service::{ImagePipeline, ProcessedImage, DEFAULT_JOB_TIMEOUT};
pub use source::{HttpImageSource, ImageSource, DEFAULT_FETCH_TIMEOUT};

//! Decode, resize and re-encode.
//!
//! Everything here is synchronous and CPU-bound; callers run it on the
//! blocking thread pool.
//!
//! - **JPEG**: quality is honored, alpha is dropped.
//! - **PNG**: lossless, quality is ignored.
//! - **WebP**: lossy through libwebp, quality maps to its 0-100 scale. The
//!   `image` crate only writes lossless WebP, which would ignore quality.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use super::dimensions::target_dimensions;
use crate::error::ProcessError;
use crate::format::OutputFormat;

/// Minimum accepted quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum accepted quality.
pub const MAX_QUALITY: u8 = 100;

/// Quality used when a request does not ask for one.
pub const DEFAULT_QUALITY: u8 = 85;

/// Whether `quality` is within [`MIN_QUALITY`, `MAX_QUALITY`].
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_QUALITY..=MAX_QUALITY).contains(&quality)
}

// =============================================================================
// Transform
// =============================================================================

/// Decode `source`, resize it to the requested box and encode it as `format`.
///
/// `width` or `height` may be zero, in which case it is derived from the
/// source aspect ratio.
pub fn transform(
    source: &[u8],
    width: u32,
    height: u32,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>, ProcessError> {
    let decoded = decode(source)?;
    let (final_width, final_height) =
        target_dimensions(decoded.width(), decoded.height(), width, height);

    let resized = decoded.resize_exact(final_width, final_height, FilterType::Lanczos3);

    encode(&resized, format, quality)
}

/// Decode an image, sniffing its container format from the bytes.
pub fn decode(source: &[u8]) -> Result<DynamicImage, ProcessError> {
    image::load_from_memory(source).map_err(|e| ProcessError::Decode {
        message: e.to_string(),
    })
}

/// Encode a decoded image.
pub fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>, ProcessError> {
    let quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);

    match format {
        OutputFormat::Jpeg => encode_jpeg(img, quality),
        OutputFormat::Png => encode_png(img),
        OutputFormat::WebP => encode_webp(img, quality),
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessError> {
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);

    encoder
        .encode_image(&img.to_rgb8())
        .map_err(|e| encode_error(OutputFormat::Jpeg, e))?;

    Ok(output)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ProcessError> {
    let mut output = Vec::new();

    img.write_with_encoder(PngEncoder::new(&mut output))
        .map_err(|e| encode_error(OutputFormat::Png, e))?;

    Ok(output)
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessError> {
    let rgba = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());

    let memory = encoder
        .encode_simple(false, f32::from(quality))
        .map_err(|e| encode_error(OutputFormat::WebP, format!("{:?}", e)))?;

    Ok(memory.to_vec())
}

fn encode_error(format: OutputFormat, err: impl ToString) -> ProcessError {
    ProcessError::Encode {
        format,
        message: err.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

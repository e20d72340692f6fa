use crate::format::OutputFormat;

/// A validated resize request.
///
/// At least one of `width` and `height` is positive and neither exceeds
/// [`MAX_DIMENSION`]; a zero side is derived from the source aspect ratio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeRequest {
    pub source_url: String,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: u8,
}

/// Largest accepted width or height.
pub const MAX_DIMENSION: u32 = 2000;

impl ResizeRequest {
    pub fn new(
        source_url: impl Into<String>,
        width: u32,
        height: u32,
        format: OutputFormat,
        quality: u8,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            width,
            height,
            format,
            quality,
        }
    }

    /// Cache key for this request's output.
    pub fn fingerprint(&self) -> String {
        crate::cache::fingerprint(&self.source_url, self.width, self.height, self.format)
    }
}

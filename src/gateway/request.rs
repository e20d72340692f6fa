use serde::Deserialize;

use crate::error::ValidationError;
use crate::format::OutputFormat;
use crate::pipeline::{
    is_valid_quality, DomainAllowList, ResizeRequest, DEFAULT_QUALITY, MAX_DIMENSION,
};

/// Format used when the query does not name one.
pub const DEFAULT_FORMAT: OutputFormat = OutputFormat::Jpeg;

// =============================================================================
// Settings
// =============================================================================

/// Request policy applied by the gateway before any work is scheduled.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub allow_list: DomainAllowList,
    pub valid_formats: Vec<OutputFormat>,
    pub default_quality: u8,
}

impl GatewaySettings {
    /// Settings accepting every format with the default quality.
    pub fn new(allow_list: DomainAllowList) -> Self {
        Self {
            allow_list,
            valid_formats: OutputFormat::ALL.to_vec(),
            default_quality: DEFAULT_QUALITY,
        }
    }

    pub fn with_valid_formats(mut self, formats: impl Into<Vec<OutputFormat>>) -> Self {
        self.valid_formats = formats.into();
        self
    }

    pub fn with_default_quality(mut self, quality: u8) -> Self {
        self.default_quality = quality;
        self
    }
}

// =============================================================================
// Query Parameters
// =============================================================================

/// Raw `/resize` query parameters.
///
/// Everything is kept as text so that malformed numbers can be read leniently:
/// a missing or non-numeric width or height counts as zero, and a non-numeric
/// quality counts as zero (and is then rejected).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResizeQueryParams {
    pub url: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub format: Option<String>,
    pub quality: Option<String>,
}

impl ResizeQueryParams {
    /// Validate the parameters against `settings`.
    ///
    /// Checks run in a fixed order and the first failure wins: URL present,
    /// URL host allowed, some dimension given, dimensions in range, format
    /// accepted, quality in range.
    pub fn validate(&self, settings: &GatewaySettings) -> Result<ResizeRequest, ValidationError> {
        let url = self.url.as_deref().unwrap_or_default();
        if url.is_empty() {
            return Err(ValidationError::MissingUrl);
        }

        if !settings.allow_list.is_allowed(url) {
            return Err(ValidationError::InvalidDomain);
        }

        let width = lenient_number(self.width.as_deref());
        let height = lenient_number(self.height.as_deref());

        if width <= 0 && height <= 0 {
            return Err(ValidationError::MissingDimensions);
        }

        let max = i64::from(MAX_DIMENSION);
        if width < 0 || height < 0 || width > max || height > max {
            return Err(ValidationError::DimensionsOutOfRange);
        }

        let format = match self.format.as_deref() {
            None => DEFAULT_FORMAT,
            Some(name) => name
                .parse::<OutputFormat>()
                .map_err(|_| ValidationError::InvalidFormat)?,
        };
        if !settings.valid_formats.contains(&format) {
            return Err(ValidationError::InvalidFormat);
        }

        let quality = match self.quality.as_deref() {
            None => i64::from(settings.default_quality),
            Some(value) => lenient_number(Some(value)),
        };
        let quality = u8::try_from(quality)
            .ok()
            .filter(|quality| is_valid_quality(*quality))
            .ok_or(ValidationError::InvalidQuality)?;

        // Range checks above guarantee both fit
        Ok(ResizeRequest::new(
            url,
            width as u32,
            height as u32,
            format,
            quality,
        ))
    }
}

fn lenient_number(value: Option<&str>) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

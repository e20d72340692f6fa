use super::request::MAX_DIMENSION;

/// Final output size for a resize.
///
/// When exactly one of `width` or `height` is zero it is derived from the other
/// using the source aspect ratio, rounded to the nearest pixel and never below
/// one. A derived side is capped at [`MAX_DIMENSION`], so an extreme aspect
/// ratio squashes the image instead of producing a huge canvas. When both are
/// positive they are used as given, even if that distorts the image.
pub fn target_dimensions(
    source_width: u32,
    source_height: u32,
    width: u32,
    height: u32,
) -> (u32, u32) {
    if source_width == 0 || source_height == 0 {
        return (width.max(1), height.max(1));
    }

    let aspect = f64::from(source_width) / f64::from(source_height);

    match (width, height) {
        (0, 0) => (source_width, source_height),
        (0, h) => (scaled(f64::from(h) * aspect), h),
        (w, 0) => (w, scaled(f64::from(w) / aspect)),
        (w, h) => (w, h),
    }
}

fn scaled(value: f64) -> u32 {
    (value.round() as u32).clamp(1, MAX_DIMENSION)
}

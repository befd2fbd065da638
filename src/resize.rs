use crate::types::{ConversionError, ResizeMode};

/// Largest pixel buffer a resize may allocate, matching the decoder's default limit.
pub const MAX_RESIZE_BYTES: u64 = 512 * 1024 * 1024;

/// Refuse a resize whose output buffer would exceed `MAX_RESIZE_BYTES`.
pub fn check_allocation(width: u32, height: u32, bytes_per_pixel: u8) -> Result<(), ConversionError> {
    let needed = width as u64 * height as u64 * bytes_per_pixel as u64;
    if needed > MAX_RESIZE_BYTES {
        return Err(ConversionError::InvalidResizeValue {
            message: format!(
                "{}x{} would need {} MiB, limit is {} MiB",
                width,
                height,
                needed / (1024 * 1024),
                MAX_RESIZE_BYTES / (1024 * 1024)
            ),
        });
    }
    Ok(())
}

pub(crate) fn validate_percent(percent: f32) -> Result<(), ConversionError> {
    if !percent.is_finite() || percent <= 0.0 {
        return Err(ConversionError::InvalidResizeValue {
            message: format!("percentage must be a positive number, got {}", percent),
        });
    }
    Ok(())
}

/// Work out the pixel size an image should be resized to.
///
/// `None` means leave the image alone. `Exact` ignores aspect ratio and needs
/// both sides to be non-zero. `TargetSize` never resizes; it only feeds the
/// quality search.
pub fn plan(
    mode: ResizeMode,
    source_width: u32,
    source_height: u32,
) -> Result<Option<(u32, u32)>, ConversionError> {
    match mode {
        ResizeMode::Percent(percent) => {
            validate_percent(percent)?;
            if percent == 100.0 {
                return Ok(None);
            }
            Ok(Some((
                scale(source_width, percent),
                scale(source_height, percent),
            )))
        }
        ResizeMode::Exact { width, height } if width > 0 && height > 0 => {
            Ok(Some((width, height)))
        }
        ResizeMode::Exact { .. } | ResizeMode::TargetSize { .. } => Ok(None),
    }
}

fn scale(dimension: u32, percent: f32) -> u32 {
    let scaled = (dimension as f64 * percent as f64 / 100.0).round();
    scaled.clamp(1.0, u32::MAX as f64) as u32
}

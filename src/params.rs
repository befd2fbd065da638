use crate::format::FormatInfo;
use crate::types::EncodeParameters;

/// Turn the single 1-100 quality knob into encoder settings for `format`.
///
/// Lossy formats take the quality as-is. Formats with a lossless compression
/// level get it mapped inversely across the whole level range, so a higher
/// quality asks for a lighter (faster, larger) compression. Anything else has
/// no knob and gets the empty set.
pub fn derive(format: &FormatInfo, quality: u8) -> EncodeParameters {
    let quality = quality.clamp(1, 100);

    if format.is_lossy {
        return EncodeParameters {
            lossy_quality: Some(quality),
            ..EncodeParameters::default()
        };
    }

    match format.max_compression_level {
        Some(max_level) => EncodeParameters {
            lossless_compression_level: Some(compression_level(quality, max_level)),
            optimize: true,
            ..EncodeParameters::default()
        },
        None => EncodeParameters::default(),
    }
}

fn compression_level(quality: u8, max_level: u8) -> u8 {
    let level = ((100 - quality as u32) as f32 * max_level as f32 / 100.0).round();
    (level as u8).min(max_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;

    #[test]
    fn lossy_formats_pass_quality_through() {
        for format in [OutputFormat::Jpeg, OutputFormat::Webp] {
            let info = format.info();
            for q in 1..=100u8 {
                let params = derive(&info, q);
                assert_eq!(params.lossy_quality, Some(q));
                assert_eq!(params.lossless_compression_level, None);
            }
        }
    }

    #[test]
    fn png_level_decreases_with_quality() {
        let info = OutputFormat::Png.info();
        let mut previous = u8::MAX;
        for q in 1..=100u8 {
            let params = derive(&info, q);
            let level = params.lossless_compression_level.unwrap();
            assert!(level <= 9);
            assert!(level <= previous, "level rose at quality {}", q);
            assert!(params.optimize);
            assert_eq!(params.lossy_quality, None);
            previous = level;
        }
    }

    #[test]
    fn png_level_spans_the_full_range() {
        let info = OutputFormat::Png.info();
        assert_eq!(derive(&info, 1).lossless_compression_level, Some(9));
        assert_eq!(derive(&info, 50).lossless_compression_level, Some(5));
        assert_eq!(derive(&info, 100).lossless_compression_level, Some(0));
    }

    #[test]
    fn formats_without_a_knob_get_nothing() {
        for format in [OutputFormat::Gif, OutputFormat::Bmp, OutputFormat::Tiff] {
            assert_eq!(derive(&format.info(), 42), EncodeParameters::default());
        }
    }

    #[test]
    fn out_of_range_quality_is_clamped() {
        let info = OutputFormat::Jpeg.info();
        assert_eq!(derive(&info, 0).lossy_quality, Some(1));
        assert_eq!(derive(&info, 255).lossy_quality, Some(100));
    }

    #[test]
    fn derive_is_pure() {
        for format in OutputFormat::ALL {
            let info = format.info();
            assert_eq!(derive(&info, 73), derive(&info, 73));
        }
    }
}

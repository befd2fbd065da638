use crate::format::{FormatInfo, OutputFormat};
use crate::resize;
use crate::types::*;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Number of trial encodes the target-size search performs, no more, no less.
pub const SEARCH_ITERATIONS: u32 = 10;

/// A decoded source image, upright and owned by a single conversion.
pub struct DecodedImage {
    image: DynamicImage,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Palette sources are expanded by the decoder, so a transparent palette
    /// shows up here as an alpha channel.
    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub fn as_image(&self) -> &DynamicImage {
        &self.image
    }
}

impl From<DynamicImage> for DecodedImage {
    fn from(image: DynamicImage) -> Self {
        Self { image }
    }
}

/// How close the size search got to the requested budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOutcome {
    pub quality: u8,
    pub encoded_bytes: usize,
    pub trials: u32,
    pub within_target: bool,
}

pub struct ImageProcessor {
    filter: FilterType,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }

    /// Decode `path` using the codec its extension names, then bake in any
    /// embedded orientation so the output no longer depends on it.
    pub fn decode(&self, path: &Path) -> Result<DecodedImage, ConversionError> {
        let reader = ImageReader::open(path)?;
        let mut decoder = reader.into_decoder().map_err(ConversionError::Decode)?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

        let mut image = DynamicImage::from_decoder(decoder).map_err(ConversionError::Decode)?;
        if orientation != Orientation::NoTransforms {
            log::debug!("Applying orientation {:?} to {}", orientation, path.display());
            image.apply_orientation(orientation);
        }

        Ok(DecodedImage { image })
    }

    /// Resample to exactly `width x height`, refusing sizes whose buffers
    /// would not fit under `resize::MAX_RESIZE_BYTES`.
    pub fn resize(
        &self,
        decoded: &mut DecodedImage,
        width: u32,
        height: u32,
    ) -> Result<(), ConversionError> {
        let (old_width, old_height) = decoded.image.dimensions();
        resize::check_allocation(width, height, decoded.image.color().bytes_per_pixel())?;

        decoded.image = decoded.image.resize_exact(width, height, self.filter);
        log::debug!(
            "Resized {}x{} -> {}x{}",
            old_width, old_height, width, height
        );
        Ok(())
    }

    /// Drop transparency when the target format cannot carry it.
    /// Returns whether anything changed.
    pub fn flatten_alpha(&self, decoded: &mut DecodedImage, format: &FormatInfo) -> bool {
        if format.supports_alpha || !decoded.has_alpha() {
            return false;
        }
        decoded.image = DynamicImage::ImageRgb8(decoded.image.to_rgb8());
        true
    }

    /// Encode into memory. Used both for trial encodes and for the final save.
    pub fn encode(
        &self,
        image: &DynamicImage,
        format: &FormatInfo,
        params: &EncodeParameters,
    ) -> Result<Vec<u8>, ConversionError> {
        let mut output = Vec::new();

        match format.format {
            OutputFormat::Jpeg => {
                let quality = params.lossy_quality.unwrap_or(DEFAULT_QUALITY);
                let encoder = JpegEncoder::new_with_quality(&mut output, quality);
                image
                    .to_rgb8()
                    .write_with_encoder(encoder)
                    .map_err(ConversionError::encode)?;
            }
            OutputFormat::Png => {
                let filter = if params.optimize {
                    PngFilter::Adaptive
                } else {
                    PngFilter::Sub
                };
                let encoder = PngEncoder::new_with_quality(
                    &mut output,
                    png_compression(params.lossless_compression_level),
                    filter,
                );
                image
                    .write_with_encoder(encoder)
                    .map_err(ConversionError::encode)?;
            }
            OutputFormat::Webp => {
                let quality = params.lossy_quality.unwrap_or(DEFAULT_QUALITY) as f32;
                let (width, height) = image.dimensions();
                let has_alpha = image.color().has_alpha();
                let pixels = if has_alpha {
                    image.to_rgba8().into_raw()
                } else {
                    image.to_rgb8().into_raw()
                };
                let encoder = if has_alpha {
                    webp::Encoder::from_rgba(&pixels, width, height)
                } else {
                    webp::Encoder::from_rgb(&pixels, width, height)
                };
                let memory = encoder
                    .encode_simple(false, quality)
                    .map_err(|e| ConversionError::encode(format!("WebP encoder failed: {:?}", e)))?;
                output.extend_from_slice(&memory);
            }
            OutputFormat::Gif => {
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_to(&mut Cursor::new(&mut output), format.codec_id)
                    .map_err(ConversionError::encode)?;
            }
            OutputFormat::Bmp => {
                DynamicImage::ImageRgb8(image.to_rgb8())
                    .write_to(&mut Cursor::new(&mut output), format.codec_id)
                    .map_err(ConversionError::encode)?;
            }
            OutputFormat::Tiff => {
                image
                    .write_to(&mut Cursor::new(&mut output), format.codec_id)
                    .map_err(ConversionError::encode)?;
            }
        }

        Ok(output)
    }

    /// Find the highest lossy quality whose encode fits in `target_kb`.
    ///
    /// Returns `None` for formats without a lossy quality axis. The answer is
    /// best effort: when even the lowest quality tried is too big, that quality
    /// comes back with `within_target == false` rather than an error.
    pub fn search_quality_for_target(
        &self,
        image: &DynamicImage,
        target_kb: u32,
        format: &FormatInfo,
        base_params: &EncodeParameters,
    ) -> Result<Option<SearchOutcome>, ConversionError> {
        if !format.is_lossy {
            return Ok(None);
        }

        let budget = target_kb as u64 * 1024;
        let outcome = bisect_quality(budget, |quality| {
            let params = EncodeParameters {
                lossy_quality: Some(quality),
                ..*base_params
            };
            self.encode(image, format, &params).map(|encoded| encoded.len())
        })?;

        if outcome.within_target {
            log::info!(
                "Target {} KB met at {} quality {} ({} bytes)",
                target_kb, format.format, outcome.quality, outcome.encoded_bytes
            );
        } else {
            log::warn!(
                "Target {} KB not reachable for {}; using quality {} ({} bytes)",
                target_kb, format.format, outcome.quality, outcome.encoded_bytes
            );
        }

        Ok(Some(outcome))
    }
}

/// Binary search over quality 1..=100 with a fixed trial count. `trial`
/// returns the encoded size in bytes for a given quality.
pub(crate) fn bisect_quality<F>(budget_bytes: u64, mut trial: F) -> Result<SearchOutcome, ConversionError>
where
    F: FnMut(u8) -> Result<usize, ConversionError>,
{
    let (mut lo, mut hi) = (1i32, 100i32);
    let mut best: Option<(u8, usize)> = None;
    let mut lowest: Option<(u8, usize)> = None;
    let mut trials = 0;

    for _ in 0..SEARCH_ITERATIONS {
        // Once the bounds cross the midpoint is pinned back into range, which
        // keeps the trial count fixed.
        let quality = ((lo + hi) / 2).clamp(1, 100) as u8;
        let size = trial(quality)?;
        trials += 1;
        log::debug!("Quality trial {} -> {} bytes", quality, size);

        if lowest.map_or(true, |(q, _)| quality < q) {
            lowest = Some((quality, size));
        }

        if size as u64 > budget_bytes {
            hi = quality as i32 - 1;
        } else {
            if best.map_or(true, |(q, _)| quality > q) {
                best = Some((quality, size));
            }
            lo = quality as i32 + 1;
        }
    }

    let within_target = best.is_some();
    let (quality, encoded_bytes) = best.or(lowest).unwrap_or((1, 0));

    Ok(SearchOutcome {
        quality,
        encoded_bytes,
        trials,
        within_target,
    })
}

fn png_compression(level: Option<u8>) -> CompressionType {
    match level {
        Some(0..=2) => CompressionType::Fast,
        Some(7..=u8::MAX) => CompressionType::Best,
        _ => CompressionType::Default,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::params;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    /// Deterministic noise, which compresses badly enough to make quality matter.
    pub(crate) fn noise_image(width: u32, height: u32) -> RgbImage {
        let mut state: u32 = 0x2545_f491;
        RgbImage::from_fn(width, height, |_, _| {
            let mut next = || {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 0xff) as u8
            };
            Rgb([next(), next(), next()])
        })
    }

    pub(crate) fn translucent_image(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7) as u8, (y * 5) as u8, 90, if x % 2 == 0 { 40 } else { 255 }])
        })
    }

    #[test]
    fn bisect_runs_a_fixed_number_of_trials() {
        for budget in [0u64, 1, 25_000, 50_000, 10_000_000] {
            let mut calls = 0;
            let outcome = bisect_quality(budget, |q| {
                calls += 1;
                Ok(q as usize * 1000)
            })
            .unwrap();
            assert_eq!(calls, SEARCH_ITERATIONS);
            assert_eq!(outcome.trials, calls);
        }
    }

    #[test]
    fn bisect_finds_highest_fitting_quality() {
        let outcome = bisect_quality(50_000, |q| Ok(q as usize * 1000)).unwrap();
        assert_eq!(outcome.quality, 50);
        assert!(outcome.within_target);

        let outcome = bisect_quality(73_500, |q| Ok(q as usize * 1000)).unwrap();
        assert_eq!(outcome.quality, 73);
        assert_eq!(outcome.encoded_bytes, 73_000);
    }

    #[test]
    fn bisect_falls_back_to_lowest_tried() {
        let outcome = bisect_quality(10, |q| Ok(q as usize * 1000)).unwrap();
        assert_eq!(outcome.quality, 1);
        assert!(!outcome.within_target);
    }

    #[test]
    fn bisect_stops_on_encoder_error() {
        let result = bisect_quality(1000, |_| Err(ConversionError::encode("boom")));
        assert!(matches!(result, Err(ConversionError::Encode { .. })));
    }

    #[test]
    fn generous_target_keeps_top_quality() {
        let processor = ImageProcessor::new();
        let image = DynamicImage::ImageRgb8(noise_image(64, 64));
        let info = OutputFormat::Jpeg.info();
        let base = params::derive(&info, 80);

        let outcome = processor
            .search_quality_for_target(&image, 10 * 1024, &info, &base)
            .unwrap()
            .unwrap();
        assert!(outcome.quality >= 99);
        assert!(outcome.within_target);
        assert_eq!(outcome.trials, SEARCH_ITERATIONS);
    }

    #[test]
    fn impossible_target_returns_lowest_quality() {
        let processor = ImageProcessor::new();
        let image = DynamicImage::ImageRgb8(noise_image(640, 640));
        let info = OutputFormat::Jpeg.info();
        let base = params::derive(&info, 80);

        let outcome = processor
            .search_quality_for_target(&image, 1, &info, &base)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.quality, 1);
        assert!(!outcome.within_target);
    }

    #[test]
    fn lossless_formats_are_not_searchable() {
        let processor = ImageProcessor::new();
        let image = DynamicImage::ImageRgb8(noise_image(8, 8));
        for format in [OutputFormat::Png, OutputFormat::Gif, OutputFormat::Bmp, OutputFormat::Tiff] {
            let info = format.info();
            let base = params::derive(&info, 80);
            assert!(processor
                .search_quality_for_target(&image, 1, &info, &base)
                .unwrap()
                .is_none());
        }
    }

    #[test]
    fn every_format_encodes() {
        let processor = ImageProcessor::new();
        let image = DynamicImage::ImageRgba8(translucent_image(16, 12));
        for format in OutputFormat::ALL {
            let info = format.info();
            let mut decoded = DecodedImage::from(image.clone());
            processor.flatten_alpha(&mut decoded, &info);
            let bytes = processor
                .encode(decoded.as_image(), &info, &params::derive(&info, 70))
                .unwrap();
            let guessed = image::guess_format(&bytes).unwrap();
            assert_eq!(guessed, info.codec_id, "{} output sniffed wrong", format);
        }
    }

    #[test]
    fn flatten_only_touches_alpha_incapable_formats() {
        let processor = ImageProcessor::new();
        let image = DynamicImage::ImageRgba8(translucent_image(4, 4));

        let mut for_jpeg = DecodedImage::from(image.clone());
        assert!(processor.flatten_alpha(&mut for_jpeg, &OutputFormat::Jpeg.info()));
        assert!(!for_jpeg.has_alpha());

        let mut for_png = DecodedImage::from(image);
        assert!(!processor.flatten_alpha(&mut for_png, &OutputFormat::Png.info()));
        assert!(for_png.has_alpha());
    }

    #[test]
    fn webp_keeps_alpha() {
        let processor = ImageProcessor::new();
        let info = OutputFormat::Webp.info();
        let image = DynamicImage::ImageRgba8(translucent_image(16, 16));
        let bytes = processor
            .encode(&image, &info, &params::derive(&info, 90))
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn lower_jpeg_quality_is_smaller() {
        let processor = ImageProcessor::new();
        let info = OutputFormat::Jpeg.info();
        let image = DynamicImage::ImageRgb8(noise_image(64, 64));
        let high = processor.encode(&image, &info, &params::derive(&info, 95)).unwrap();
        let low = processor.encode(&image, &info, &params::derive(&info, 10)).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn resize_changes_dimensions() {
        let processor = ImageProcessor::new();
        let mut decoded = DecodedImage::from(DynamicImage::ImageRgb8(noise_image(40, 20)));
        processor.resize(&mut decoded, 10, 30).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 30));
    }
}

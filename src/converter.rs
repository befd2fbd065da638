use crate::format::FormatInfo;
use crate::image_processor::ImageProcessor;
use crate::types::*;
use crate::{params, resize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Runs one source file through decode, orient, resize, flatten, encode and save.
pub struct ImageConverter {
    image_processor: ImageProcessor,
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageConverter {
    pub fn new() -> Self {
        Self {
            image_processor: ImageProcessor::new(),
        }
    }

    pub fn with_processor(image_processor: ImageProcessor) -> Self {
        Self { image_processor }
    }

    /// Convert a single file. Never returns an error: anything that goes wrong
    /// comes back as a `Failure` naming the input.
    pub fn convert_one(
        &self,
        input_path: &Path,
        options: &ConversionOptions,
        destination_dir: &Path,
    ) -> ConversionResult {
        match self.try_convert(input_path, options, destination_dir) {
            Ok(output_path) => {
                log::info!(
                    "✅ Converted {} -> {}",
                    input_path.display(),
                    output_path.display()
                );
                ConversionResult::Success { output_path }
            }
            Err(e) => {
                let input_name = display_name(input_path);
                log::error!("❌ Failed to convert {}: {}", input_name, e);
                ConversionResult::Failure {
                    input_name,
                    message: e.to_string(),
                }
            }
        }
    }

    fn try_convert(
        &self,
        input_path: &Path,
        options: &ConversionOptions,
        destination_dir: &Path,
    ) -> Result<PathBuf, ConversionError> {
        let format = options.output_format.info();

        let mut decoded = self.image_processor.decode(input_path)?;

        if let Some((width, height)) =
            resize::plan(options.resize_mode, decoded.width(), decoded.height())?
        {
            self.image_processor.resize(&mut decoded, width, height)?;
        }

        if self.image_processor.flatten_alpha(&mut decoded, &format) {
            log::debug!("Flattened transparency for {}", format.format);
        }

        let mut encode_params = params::derive(&format, options.quality());

        if let ResizeMode::TargetSize { kilobytes } = options.resize_mode {
            if kilobytes > 0 {
                let searched = self.image_processor.search_quality_for_target(
                    decoded.as_image(),
                    kilobytes,
                    &format,
                    &encode_params,
                )?;
                match searched {
                    Some(outcome) => encode_params.lossy_quality = Some(outcome.quality),
                    None => log::debug!(
                        "{} has no lossy quality, ignoring {} KB target",
                        format.format, kilobytes
                    ),
                }
            }
        }

        let encoded = self
            .image_processor
            .encode(decoded.as_image(), &format, &encode_params)?;
        drop(decoded);

        let stem = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        write_output(destination_dir, &stem, &format, &encoded)
    }
}

/// First free `{stem}_converted.{ext}` / `{stem}_converted_{n}.{ext}` in `dir`.
pub fn output_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{}_converted.{}", stem, extension));
    if !candidate.exists() {
        return candidate;
    }

    (1u32..)
        .map(|n| dir.join(format!("{}_converted_{}.{}", stem, n, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Write through a temp file in the destination and move it into place
/// without replacing anything, so a failed write leaves nothing behind.
fn write_output(
    destination_dir: &Path,
    stem: &str,
    format: &FormatInfo,
    encoded: &[u8],
) -> Result<PathBuf, ConversionError> {
    let mut temp = NamedTempFile::new_in(destination_dir)?;
    temp.write_all(encoded)?;
    temp.as_file().sync_all()?;

    let target = output_path(destination_dir, stem, format.default_extension);
    temp.persist_noclobber(&target).map_err(|e| e.error)?;

    log::debug!("Wrote {} bytes to {}", encoded.len(), target.display());
    Ok(target)
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

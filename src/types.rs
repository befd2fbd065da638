use crate::format::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Unknown output format: {selector}")]
    UnknownFormat { selector: String },

    #[error("Invalid resize value: {message}")]
    InvalidResizeValue { message: String },

    #[error("Could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Could not encode image: {message}")]
    Encode { message: String },

    #[error("No input files to convert")]
    EmptyBatch,

    #[error("Destination directory is not available: {}", .path.display())]
    DestinationUnavailable { path: PathBuf },
}

impl ConversionError {
    pub(crate) fn encode(err: impl std::fmt::Display) -> Self {
        Self::Encode { message: err.to_string() }
    }
}

/// Geometric resize request. Only one mode is ever active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    Percent(f32),
    Exact { width: u32, height: u32 },
    /// Drives the quality search instead of resizing.
    TargetSize { kilobytes: u32 },
}

impl Default for ResizeMode {
    fn default() -> Self {
        ResizeMode::Percent(100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub output_format: OutputFormat,
    #[serde(default = "default_quality")]
    quality: u8,
    #[serde(default)]
    pub resize_mode: ResizeMode,
    pub destination_directory: PathBuf,
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

impl ConversionOptions {
    pub fn new(
        output_format: OutputFormat,
        quality: u8,
        resize_mode: ResizeMode,
        destination_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            output_format,
            quality: quality.clamp(1, 100),
            resize_mode,
            destination_directory: destination_directory.into(),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConversionError> {
        let raw = std::fs::read_to_string(path)?;
        let mut options: Self = serde_json::from_str(&raw)?;
        options.quality = options.quality.clamp(1, 100);
        Ok(options)
    }

    /// Quality in [1, 100], whatever was deserialized.
    pub fn quality(&self) -> u8 {
        self.quality.clamp(1, 100)
    }

    pub fn set_quality(&mut self, quality: u8) {
        self.quality = quality.clamp(1, 100);
    }

    /// Catches bad options before any item is attempted.
    pub fn validate(&self) -> Result<(), ConversionError> {
        if let ResizeMode::Percent(percent) = self.resize_mode {
            crate::resize::validate_percent(percent)?;
        }

        if !self.destination_directory.is_dir() {
            return Err(ConversionError::DestinationUnavailable {
                path: self.destination_directory.clone(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct EncodeParameters {
    pub lossy_quality: Option<u8>,
    pub lossless_compression_level: Option<u8>,
    pub optimize: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionResult {
    Success { output_path: PathBuf },
    Failure { input_name: String, message: String },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub results: Vec<ConversionResult>,
}

impl BatchSummary {
    pub(crate) fn record(&mut self, result: ConversionResult) {
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }
}

//! Batch Image Converter Library
//!
//! Converts lists of raster images between PNG, JPEG, WebP, GIF, BMP and TIFF,
//! with optional resizing and either a fixed quality or a target output size.
//! Conversion runs one file at a time off the caller's thread and reports a
//! result per file plus overall progress.

pub mod batch;
pub mod converter;
pub mod format;
pub mod image_processor;
pub mod intake;
pub mod params;
pub mod resize;
pub mod types;

pub use batch::{BatchEvent, BatchRunner, BatchState, CancelToken};
pub use converter::ImageConverter;
pub use format::{resolve, FormatInfo, OutputFormat};
pub use image_processor::{DecodedImage, ImageProcessor, SearchOutcome};
pub use intake::InputList;
pub use types::*;

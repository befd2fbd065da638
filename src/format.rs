use crate::types::ConversionError;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output formats a batch can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
    Gif,
    Bmp,
    Tiff,
}

/// Everything the pipeline needs to know about a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub format: OutputFormat,
    pub codec_id: ImageFormat,
    pub default_extension: &'static str,
    pub supports_alpha: bool,
    pub is_lossy: bool,
    /// Upper bound of the lossless compression-level knob, if the codec has one.
    pub max_compression_level: Option<u8>,
}

const CATALOG: [FormatInfo; 6] = [
    FormatInfo {
        format: OutputFormat::Png,
        codec_id: ImageFormat::Png,
        default_extension: "png",
        supports_alpha: true,
        is_lossy: false,
        max_compression_level: Some(9),
    },
    FormatInfo {
        format: OutputFormat::Jpeg,
        codec_id: ImageFormat::Jpeg,
        default_extension: "jpg",
        supports_alpha: false,
        is_lossy: true,
        max_compression_level: None,
    },
    FormatInfo {
        format: OutputFormat::Webp,
        codec_id: ImageFormat::WebP,
        default_extension: "webp",
        supports_alpha: true,
        is_lossy: true,
        max_compression_level: None,
    },
    FormatInfo {
        format: OutputFormat::Gif,
        codec_id: ImageFormat::Gif,
        default_extension: "gif",
        supports_alpha: true,
        is_lossy: false,
        max_compression_level: None,
    },
    FormatInfo {
        format: OutputFormat::Bmp,
        codec_id: ImageFormat::Bmp,
        default_extension: "bmp",
        supports_alpha: false,
        is_lossy: false,
        max_compression_level: None,
    },
    FormatInfo {
        format: OutputFormat::Tiff,
        codec_id: ImageFormat::Tiff,
        default_extension: "tiff",
        supports_alpha: false,
        is_lossy: false,
        max_compression_level: None,
    },
];

impl OutputFormat {
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Png,
        OutputFormat::Jpeg,
        OutputFormat::Webp,
        OutputFormat::Gif,
        OutputFormat::Bmp,
        OutputFormat::Tiff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "PNG",
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Webp => "WEBP",
            OutputFormat::Gif => "GIF",
            OutputFormat::Bmp => "BMP",
            OutputFormat::Tiff => "TIFF",
        }
    }

    pub fn info(&self) -> FormatInfo {
        CATALOG[*self as usize]
    }
}

/// Look up a format by its user-facing name, ignoring case.
pub fn resolve(selector: &str) -> Result<FormatInfo, ConversionError> {
    let selector = selector.trim();
    OutputFormat::ALL
        .iter()
        .find(|format| format.as_str().eq_ignore_ascii_case(selector))
        .map(OutputFormat::info)
        .ok_or_else(|| ConversionError::UnknownFormat {
            selector: selector.to_string(),
        })
}

impl FromStr for OutputFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve(s).map(|info| info.format)
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_format_has_a_distinct_extension() {
        let mut seen = HashSet::new();
        for format in OutputFormat::ALL {
            let info = resolve(format.as_str()).unwrap();
            assert_eq!(info.format, format);
            assert!(!info.default_extension.is_empty());
            assert!(seen.insert(info.default_extension));
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn catalog_order_matches_enum() {
        for format in OutputFormat::ALL {
            assert_eq!(format.info().format, format);
        }
    }

    #[test]
    fn selectors_are_case_insensitive() {
        assert_eq!(resolve("jpeg").unwrap().default_extension, "jpg");
        assert_eq!(resolve(" Tiff ").unwrap().format, OutputFormat::Tiff);
        assert_eq!("webp".parse::<OutputFormat>().unwrap(), OutputFormat::Webp);
    }

    #[test]
    fn unknown_selector_is_rejected() {
        match resolve("AVIF") {
            Err(ConversionError::UnknownFormat { selector }) => assert_eq!(selector, "AVIF"),
            other => panic!("expected UnknownFormat, got {:?}", other),
        }
        assert!(resolve("").is_err());
    }

    #[test]
    fn capability_table() {
        let lossy: Vec<_> = OutputFormat::ALL
            .iter()
            .filter(|f| f.info().is_lossy)
            .copied()
            .collect();
        assert_eq!(lossy, vec![OutputFormat::Jpeg, OutputFormat::Webp]);

        assert!(!OutputFormat::Jpeg.info().supports_alpha);
        assert!(!OutputFormat::Bmp.info().supports_alpha);
        assert!(!OutputFormat::Tiff.info().supports_alpha);
        assert!(OutputFormat::Png.info().supports_alpha);
        assert!(OutputFormat::Webp.info().supports_alpha);
        assert_eq!(OutputFormat::Png.info().max_compression_level, Some(9));
    }

    #[test]
    fn serializes_as_uppercase_name() {
        let json = serde_json::to_string(&OutputFormat::Webp).unwrap();
        assert_eq!(json, "\"WEBP\"");
        let back: OutputFormat = serde_json::from_str("\"jpeg\"").unwrap();
        assert_eq!(back, OutputFormat::Jpeg);
    }
}

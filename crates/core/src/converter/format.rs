//! Output format catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ConverterError;

/// Animated raster formats the converter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Animated GIF with a reserved transparent palette entry.
    Gif,
    /// Animated PNG.
    Apng,
    /// Animated lossless WebP.
    Webp,
}

/// Static attributes of an output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatDescriptor {
    /// File extension, without the leading dot.
    pub extension: &'static str,
    /// MIME type of the produced bytes.
    pub mime_type: &'static str,
    /// Human readable label.
    pub label: &'static str,
    /// One-line summary shown next to the label.
    pub description: &'static str,
}

const GIF: FormatDescriptor = FormatDescriptor {
    extension: "gif",
    mime_type: "image/gif",
    label: "GIF",
    description: "256 colors, wide support",
};

const APNG: FormatDescriptor = FormatDescriptor {
    extension: "png",
    mime_type: "image/png",
    label: "APNG",
    description: "Lossless, full color",
};

const WEBP: FormatDescriptor = FormatDescriptor {
    extension: "webp",
    mime_type: "image/webp",
    label: "WebP",
    description: "Best compression",
};

impl OutputFormat {
    /// Every format, in display order.
    pub const ALL: [OutputFormat; 3] = [Self::Gif, Self::Apng, Self::Webp];

    /// Returns the descriptor registered for this format.
    pub fn describe(&self) -> &'static FormatDescriptor {
        match self {
            Self::Gif => &GIF,
            Self::Apng => &APNG,
            Self::Webp => &WEBP,
        }
    }

    /// Short identifier used in metric labels and query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Apng => "apng",
            Self::Webp => "webp",
        }
    }

    /// Logical name the engine writes the converted animation to.
    pub fn output_name(&self) -> String {
        format!("output.{}", self.describe().extension)
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Gif
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gif" => Ok(Self::Gif),
            "apng" => Ok(Self::Apng),
            "webp" => Ok(Self::Webp),
            other => Err(ConverterError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

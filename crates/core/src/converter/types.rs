//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::format::{FormatDescriptor, OutputFormat};

/// Logical name the input container is staged under.
pub const INPUT_NAME: &str = "input.heics";

/// Input file extensions accepted as HEICS containers.
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] = &["heic", "heics"];

/// Optional pre-processing applied before the format-specific stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreprocessOptions {
    /// Bound the longer side to 128 pixels, keeping aspect ratio and never upscaling.
    #[serde(default)]
    pub constrain_to_128px: bool,
    /// Drop the frame rate to 10 frames per second.
    #[serde(default)]
    pub cap_frame_rate_10: bool,
}

impl PreprocessOptions {
    /// Whether any pre-filter clause will be emitted.
    pub fn is_empty(&self) -> bool {
        !self.constrain_to_128px && !self.cap_frame_rate_10
    }
}

/// A guess about which sub-streams of the container carry color and alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StreamHypothesis {
    /// Merge `color` with `alpha` (video stream indices within input 0).
    AlphaPair { color: u8, alpha: u8 },
    /// Ignore transparency and convert the default video stream.
    NoAlpha,
}

impl StreamHypothesis {
    /// Hypotheses in the order they are tried.
    pub const PRIORITY: [StreamHypothesis; 3] = [
        Self::AlphaPair { color: 2, alpha: 3 },
        Self::AlphaPair { color: 0, alpha: 1 },
        Self::NoAlpha,
    ];

    /// Short label for logs, metrics and response headers.
    pub fn label(&self) -> String {
        match self {
            Self::AlphaPair { color, alpha } => format!("{}+{}", color, alpha),
            Self::NoAlpha => "no_alpha".to_string(),
        }
    }
}

impl fmt::Display for StreamHypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One conversion request: the target format plus pre-processing choices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub format: OutputFormat,
    #[serde(default)]
    pub options: PreprocessOptions,
}

impl ConversionRequest {
    pub fn new(format: OutputFormat, options: PreprocessOptions) -> Self {
        Self { format, options }
    }
}

/// A single hypothesis paired with the arguments built for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionAttempt {
    /// Zero-based position in the fallback order.
    pub index: usize,
    pub hypothesis: StreamHypothesis,
    pub args: Vec<String>,
}

/// Exit status reported by an engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    /// Process exit code, if the engine exited normally.
    pub code: Option<i32>,
}

impl EngineStatus {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn failure(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for EngineStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The encoded animation.
    pub bytes: Vec<u8>,
    /// Descriptor of the produced format.
    pub descriptor: &'static FormatDescriptor,
    /// The hypothesis that produced the output.
    pub hypothesis: StreamHypothesis,
    /// Number of engine runs issued, including the successful one.
    pub attempts: usize,
    /// Wall clock time of the session in milliseconds, acquisition excluded.
    pub duration_ms: u64,
}

/// Whether a file name looks like a HEICS container.
pub fn is_supported_input_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SUPPORTED_INPUT_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// Derives the download name by swapping the input extension for the output one.
///
/// The extension is the text after the last `.`, and must be non-empty and
/// free of `/`. A bare dot-name such as `.hidden` counts as all extension.
pub fn download_name(input_name: &str, format: OutputFormat) -> String {
    let stem = match input_name.rfind('.') {
        Some(idx) if idx + 1 < input_name.len() && !input_name[idx + 1..].contains('/') => {
            &input_name[..idx]
        }
        _ => input_name,
    };
    format!("{}.{}", stem, format.describe().extension)
}

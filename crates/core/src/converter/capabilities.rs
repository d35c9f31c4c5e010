//! Encoder capability detection.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

use super::config::EngineConfig;
use super::format::OutputFormat;

/// Encoders and filters detected in the local ffmpeg build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    /// GIF encoder available
    pub gif: bool,
    /// APNG encoder available
    pub apng: bool,
    /// libwebp encoder available
    pub libwebp: bool,
    /// alphamerge filter available
    pub alphamerge: bool,
}

impl EncoderCapabilities {
    /// Detect available encoders and filters by probing ffmpeg.
    pub async fn detect(config: &EngineConfig) -> Self {
        let encoders = match Self::query(config, "-encoders").await {
            Some(out) => out,
            None => return Self::default(),
        };
        let filters = Self::query(config, "-filters").await.unwrap_or_default();
        Self::from_listings(&encoders, &filters)
    }

    async fn query(config: &EngineConfig, flag: &str) -> Option<String> {
        let output = Command::new(&config.ffmpeg_path)
            .args(["-hide_banner", flag])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => Some(String::from_utf8_lossy(&o.stdout).to_string()),
            _ => None,
        }
    }

    /// Parses `ffmpeg -encoders` and `ffmpeg -filters` listings.
    pub fn from_listings(encoders: &str, filters: &str) -> Self {
        let has = |listing: &str, name: &str| {
            listing
                .lines()
                .any(|line| line.split_whitespace().nth(1) == Some(name))
        };

        Self {
            gif: has(encoders, "gif"),
            apng: has(encoders, "apng"),
            libwebp: has(encoders, "libwebp"),
            alphamerge: has(filters, "alphamerge"),
        }
    }

    /// Whether the build can encode `format` at all.
    pub fn supports(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Gif => self.gif,
            OutputFormat::Apng => self.apng,
            OutputFormat::Webp => self.libwebp,
        }
    }

    /// Formats the build can encode, in catalog order.
    pub fn available_formats(&self) -> Vec<OutputFormat> {
        OutputFormat::ALL
            .into_iter()
            .filter(|f| self.supports(*f))
            .collect()
    }

    /// Whether transparency can be preserved through the alpha merge.
    pub fn preserves_alpha(&self) -> bool {
        self.alphamerge
    }
}

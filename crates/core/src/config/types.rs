use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::converter::{EngineConfig, OutputFormat, PreprocessOptions};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub conversion: ConversionDefaults,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted container upload, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Sessions allowed to run at the same time.
    #[serde(default = "default_max_parallel_sessions")]
    pub max_parallel_sessions: usize,
    /// Wall-clock limit for one conversion request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            max_parallel_sessions: default_max_parallel_sessions(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_max_parallel_sessions() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Conversion settings applied when a request leaves them out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConversionDefaults {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub constrain_to_128px: bool,
    #[serde(default)]
    pub cap_frame_rate_10: bool,
}

impl ConversionDefaults {
    pub fn options(&self) -> PreprocessOptions {
        PreprocessOptions {
            constrain_to_128px: self.constrain_to_128px,
            cap_frame_rate_10: self.cap_frame_rate_10,
        }
    }
}

/// Sanitized config for API responses (host paths reduced)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub engine: SanitizedEngineConfig,
    pub conversion: ConversionDefaults,
}

/// Engine config without the full filesystem layout.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEngineConfig {
    /// Binary file name only
    pub ffmpeg: String,
    pub log_level: String,
    pub extra_args_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let ffmpeg = config
            .engine
            .ffmpeg_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            server: config.server.clone(),
            engine: SanitizedEngineConfig {
                ffmpeg,
                log_level: config.engine.log_level.clone(),
                extra_args_configured: !config.engine.extra_args.is_empty(),
            },
            conversion: config.conversion.clone(),
        }
    }
}

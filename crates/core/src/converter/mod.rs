//! Converter module for turning HEICS stickers into animated rasters.
//!
//! A HEICS container stores its animation as paired image-sequence streams,
//! one carrying color and one carrying the alpha mask. Which pair holds which
//! varies between authoring tools, so conversion tries a fixed list of stream
//! hypotheses against a frame-processing engine until one succeeds.
//!
//! # Features
//!
//! - GIF, APNG and lossless WebP output with transparency preserved
//! - Optional downscale to 128px and 10 fps cap
//! - One engine instance per session, with best-effort cleanup
//!
//! # Example
//!
//! ```ignore
//! use heics_core::converter::{
//!     Converter, ConversionRequest, EngineConfig, FfmpegEngineProvider, HeicsConverter,
//!     OutputFormat, PreprocessOptions,
//! };
//!
//! let converter = HeicsConverter::new(FfmpegEngineProvider::new(EngineConfig::default()));
//!
//! let request = ConversionRequest::new(
//!     OutputFormat::Gif,
//!     PreprocessOptions {
//!         constrain_to_128px: true,
//!         ..Default::default()
//!     },
//! );
//!
//! let output = converter.convert(&std::fs::read("sticker.heics")?, request).await?;
//! std::fs::write(format!("sticker.{}", output.descriptor.extension), &output.bytes)?;
//! ```

mod capabilities;
mod config;
mod error;
mod ffmpeg;
mod format;
mod graph;
mod session;
mod strategy;
mod traits;
mod types;

pub use capabilities::EncoderCapabilities;
pub use config::EngineConfig;
pub use error::{ConverterError, EngineError};
pub use ffmpeg::{FfmpegEngine, FfmpegEngineProvider};
pub use format::{FormatDescriptor, OutputFormat};
pub use graph::{FilterGraphBuilder, FPS_10_CLAUSE, SCALE_128_CLAUSE};
pub use session::{ConversionSession, HeicsConverter, SessionState};
pub use strategy::{FallbackStrategy, StrategyOutcome};
pub use traits::{Converter, EngineProvider, FrameEngine};
pub use types::{
    download_name, is_supported_input_name, ConversionAttempt, ConversionOutput,
    ConversionRequest, EngineStatus, PreprocessOptions, StreamHypothesis, INPUT_NAME,
    SUPPORTED_INPUT_EXTENSIONS,
};

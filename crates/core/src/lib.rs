pub mod config;
pub mod converter;
pub mod metrics;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, ConversionDefaults, SanitizedConfig, ServerConfig,
};
pub use converter::{
    Converter, ConversionOutput, ConversionRequest, ConverterError, EncoderCapabilities,
    EngineConfig, EngineProvider, FfmpegEngineProvider, FormatDescriptor, FrameEngine,
    HeicsConverter, OutputFormat, PreprocessOptions, StreamHypothesis,
};

//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::{ConverterError, EngineError};
use super::types::{ConversionOutput, ConversionRequest, EngineStatus};

/// A frame-processing engine with its own addressable storage.
///
/// Engines are not reentrant: a session issues one `run` at a time and an
/// engine instance is never shared between sessions.
#[async_trait]
pub trait FrameEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Writes bytes into engine storage under a logical name.
    async fn stage(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError>;

    /// Runs one processing command to completion.
    ///
    /// A non-success status is a normal outcome; `Err` means the engine
    /// could not be driven at all.
    async fn run(&self, args: &[String]) -> Result<EngineStatus, EngineError>;

    /// Reads bytes back out of engine storage.
    async fn retrieve(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    /// Deletes an entry from engine storage.
    async fn remove(&self, name: &str) -> Result<(), EngineError>;
}

/// Produces a fresh engine for every conversion session.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    type Engine: FrameEngine;

    /// Returns the name of this provider implementation.
    fn name(&self) -> &str;

    /// Loads and initializes a new engine instance. May be slow.
    async fn acquire(&self) -> Result<Self::Engine, ConverterError>;
}

#[async_trait]
impl<P: EngineProvider + ?Sized> EngineProvider for Arc<P> {
    type Engine = P::Engine;

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn acquire(&self) -> Result<Self::Engine, ConverterError> {
        (**self).acquire().await
    }
}

/// Converts HEICS containers into animated rasters.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Converts one container according to the request.
    async fn convert(
        &self,
        input: &[u8],
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConverterError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::format::OutputFormat;
    use crate::converter::types::StreamHypothesis;

    struct EchoConverter;

    #[async_trait]
    impl Converter for EchoConverter {
        fn name(&self) -> &str {
            "echo"
        }

        async fn convert(
            &self,
            input: &[u8],
            request: ConversionRequest,
        ) -> Result<ConversionOutput, ConverterError> {
            Ok(ConversionOutput {
                bytes: input.to_vec(),
                descriptor: request.format.describe(),
                hypothesis: StreamHypothesis::NoAlpha,
                attempts: 1,
                duration_ms: 0,
            })
        }
    }

    #[tokio::test]
    async fn test_shared_provider_delegates() {
        use crate::testing::{MockEngine, MockEngineProvider};

        let provider = Arc::new(MockEngineProvider::new(MockEngine::new()));
        let shared = Arc::clone(&provider);
        shared.acquire().await.unwrap();

        assert_eq!(EngineProvider::name(&shared), "mock");
        assert_eq!(provider.acquire_count(), 1);
    }

    #[tokio::test]
    async fn test_converter_is_object_safe() {
        let converter: Box<dyn Converter> = Box::new(EchoConverter);
        let output = converter
            .convert(b"abc", ConversionRequest::new(OutputFormat::Apng, Default::default()))
            .await
            .unwrap();
        assert_eq!(converter.name(), "echo");
        assert_eq!(output.bytes, b"abc");
        assert_eq!(output.descriptor.mime_type, "image/png");
    }
}

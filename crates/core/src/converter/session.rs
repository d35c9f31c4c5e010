//! One end-to-end conversion against a dedicated engine instance.

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::error::ConverterError;
use super::strategy::{FallbackStrategy, StrategyOutcome};
use super::traits::{Converter, EngineProvider, FrameEngine};
use super::types::{ConversionOutput, ConversionRequest, INPUT_NAME};
use crate::metrics::{ENGINE_ACQUIRE_DURATION, SESSIONS_TOTAL};

/// Lifecycle of a conversion session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Staging,
    Converting,
    Finalizing,
    Succeeded,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Owns one engine instance for exactly one conversion.
pub struct ConversionSession<E: FrameEngine> {
    id: Uuid,
    engine: E,
    strategy: FallbackStrategy,
    state: SessionState,
}

impl<E: FrameEngine> ConversionSession<E> {
    /// Wraps an engine that no other session has used.
    pub fn new(engine: E) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine,
            strategy: FallbackStrategy::default(),
            state: SessionState::Idle,
        }
    }

    /// Acquires a fresh engine from the provider and opens a session on it.
    pub async fn open<P>(provider: &P) -> Result<Self, ConverterError>
    where
        P: EngineProvider<Engine = E> + ?Sized,
    {
        let start = Instant::now();
        let result = provider.acquire().await;
        let outcome = if result.is_ok() { "success" } else { "failed" };
        ENGINE_ACQUIRE_DURATION
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(engine) => Ok(Self::new(engine)),
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Engine acquisition failed");
                Err(e)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(!self.state.is_terminal(), "terminal sessions never change state");
        debug!(session = %self.id, from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }

    /// Runs the conversion. A session converts once; later calls fail with
    /// [`ConverterError::SessionSpent`] without touching the engine.
    pub async fn convert(
        &mut self,
        input: &[u8],
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConverterError> {
        if self.state != SessionState::Idle {
            return Err(ConverterError::SessionSpent);
        }
        if input.is_empty() {
            self.transition(SessionState::Failed);
            return Err(ConverterError::invalid_input("input is empty"));
        }

        let span = tracing::info_span!("session", id = %self.id, format = %request.format);
        let start = Instant::now();
        let result = self.run_stages(input, &request).instrument(span).await;

        let label = if result.is_ok() { "succeeded" } else { "failed" };
        SESSIONS_TOTAL
            .with_label_values(&[request.format.as_str(), label])
            .inc();

        result.map(|(bytes, strategy)| {
            let output = ConversionOutput {
                bytes,
                descriptor: request.format.describe(),
                hypothesis: strategy.attempt.hypothesis,
                attempts: strategy.attempts,
                duration_ms: start.elapsed().as_millis() as u64,
            };
            info!(
                session = %self.id,
                format = %request.format,
                hypothesis = %output.hypothesis,
                attempts = output.attempts,
                bytes = output.bytes.len(),
                duration_ms = output.duration_ms,
                "Conversion succeeded"
            );
            output
        })
    }

    async fn run_stages(
        &mut self,
        input: &[u8],
        request: &ConversionRequest,
    ) -> Result<(Vec<u8>, StrategyOutcome), ConverterError> {
        let output_name = request.format.output_name();

        self.transition(SessionState::Staging);
        if let Err(source) = self.engine.stage(INPUT_NAME, input).await {
            self.cleanup(&[INPUT_NAME]).await;
            self.transition(SessionState::Failed);
            return Err(ConverterError::Staging {
                name: INPUT_NAME.to_string(),
                source,
            });
        }

        self.transition(SessionState::Converting);
        let outcome = match self
            .strategy
            .execute(&self.engine, request.format, &request.options)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session = %self.id, error = %e, "Conversion failed");
                self.cleanup(&[INPUT_NAME, output_name.as_str()]).await;
                self.transition(SessionState::Failed);
                return Err(e);
            }
        };

        self.transition(SessionState::Finalizing);
        let retrieved = self.engine.retrieve(&output_name).await;
        self.cleanup(&[INPUT_NAME, output_name.as_str()]).await;

        match retrieved {
            Ok(bytes) => {
                self.transition(SessionState::Succeeded);
                Ok((bytes, outcome))
            }
            Err(source) => {
                self.transition(SessionState::Failed);
                Err(ConverterError::Retrieval {
                    name: output_name,
                    source,
                })
            }
        }
    }

    /// Best-effort removal; failures never change the session result.
    async fn cleanup(&self, names: &[&str]) {
        for name in names {
            if let Err(e) = self.engine.remove(name).await {
                warn!(session = %self.id, name = %name, error = %e, "Failed to remove staged entry");
            }
        }
    }
}

/// Converter that opens a new session, and so a new engine, per request.
pub struct HeicsConverter<P: EngineProvider> {
    provider: P,
}

impl<P: EngineProvider> HeicsConverter<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: EngineProvider> Converter for HeicsConverter<P> {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn convert(
        &self,
        input: &[u8],
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConverterError> {
        let mut session = ConversionSession::open(&self.provider).await?;
        session.convert(input, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::format::OutputFormat;
    use crate::converter::types::{PreprocessOptions, StreamHypothesis};
    use crate::testing::{EngineCall, MockEngine, MockEngineProvider, DEFAULT_OUTPUT};

    fn gif() -> ConversionRequest {
        ConversionRequest::new(OutputFormat::Gif, PreprocessOptions::default())
    }

    #[tokio::test]
    async fn test_gif_first_hypothesis_call_sequence() {
        let engine = MockEngine::new()
            .succeed_on(StreamHypothesis::AlphaPair { color: 2, alpha: 3 })
            .with_output(b"GIF89a".to_vec());
        let mut session = ConversionSession::new(engine.clone());

        let output = session.convert(b"sample.heics bytes", gif()).await.unwrap();

        assert_eq!(output.bytes, b"GIF89a");
        assert_eq!(output.descriptor.extension, "gif");
        assert_eq!(output.attempts, 1);
        assert_eq!(session.state(), SessionState::Succeeded);

        let calls = engine.calls();
        assert_eq!(
            calls[0],
            EngineCall::Stage {
                name: "input.heics".to_string(),
                len: 18
            }
        );
        assert!(matches!(&calls[1], EngineCall::Run { args } if args.last().map(String::as_str) == Some("output.gif")));
        assert_eq!(
            calls[2],
            EngineCall::Retrieve {
                name: "output.gif".to_string()
            }
        );
        assert_eq!(engine.removed(), vec!["input.heics", "output.gif"]);
        assert!(engine.stored_names().is_empty());
    }

    #[tokio::test]
    async fn test_third_hypothesis_result() {
        let engine = MockEngine::new().succeed_on(StreamHypothesis::NoAlpha);
        let mut session = ConversionSession::new(engine.clone());

        let output = session.convert(b"x", gif()).await.unwrap();

        assert_eq!(output.attempts, 3);
        assert_eq!(output.hypothesis, StreamHypothesis::NoAlpha);
        assert_eq!(output.bytes, DEFAULT_OUTPUT);
        assert_eq!(engine.runs().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_returns_no_bytes_and_skips_retrieve() {
        let engine = MockEngine::new();
        let mut session = ConversionSession::new(engine.clone());

        let err = session.convert(b"x", gif()).await.unwrap_err();

        assert!(matches!(err, ConverterError::Exhausted { attempts: 3, .. }));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(!engine
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::Retrieve { .. })));
        assert!(engine.stored_names().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_failure_does_not_change_result() {
        let engine = MockEngine::new()
            .succeed_on(StreamHypothesis::AlphaPair { color: 2, alpha: 3 })
            .fail_remove();
        let mut session = ConversionSession::new(engine.clone());

        let output = session.convert(b"x", gif()).await.unwrap();

        assert_eq!(output.bytes, DEFAULT_OUTPUT);
        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(engine.removed(), vec!["input.heics", "output.gif"]);
    }

    #[tokio::test]
    async fn test_staging_failure() {
        let engine = MockEngine::new()
            .succeed_on(StreamHypothesis::NoAlpha)
            .fail_stage();
        let mut session = ConversionSession::new(engine.clone());

        let err = session.convert(b"x", gif()).await.unwrap_err();

        assert!(matches!(err, ConverterError::Staging { .. }));
        assert!(engine.runs().is_empty());
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_missing_output_is_retrieval_error() {
        let engine = MockEngine::new()
            .succeed_on(StreamHypothesis::NoAlpha)
            .skip_output();
        let mut session = ConversionSession::new(engine.clone());

        let err = session
            .convert(b"x", ConversionRequest::new(OutputFormat::Webp, PreprocessOptions::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, ConverterError::Retrieval { ref name, .. } if name == "output.webp"));
        assert_eq!(engine.removed(), vec!["input.heics", "output.webp"]);
    }

    #[tokio::test]
    async fn test_empty_input_rejected_before_staging() {
        let engine = MockEngine::new().succeed_on(StreamHypothesis::NoAlpha);
        let mut session = ConversionSession::new(engine.clone());

        let err = session.convert(b"", gif()).await.unwrap_err();

        assert!(matches!(err, ConverterError::InvalidInput { .. }));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_session_is_single_use() {
        let engine = MockEngine::new().succeed_on(StreamHypothesis::NoAlpha);
        let mut session = ConversionSession::new(engine.clone());

        session.convert(b"x", gif()).await.unwrap();
        let calls_after_first = engine.calls().len();
        let err = session.convert(b"x", gif()).await.unwrap_err();

        assert!(matches!(err, ConverterError::SessionSpent));
        assert_eq!(engine.calls().len(), calls_after_first);
    }

    #[tokio::test]
    async fn test_converter_acquires_engine_per_request() {
        let provider = MockEngineProvider::new(MockEngine::new().succeed_on(StreamHypothesis::NoAlpha));
        let converter = HeicsConverter::new(provider);

        converter.convert(b"a", gif()).await.unwrap();
        converter.convert(b"b", gif()).await.unwrap();

        assert_eq!(converter.provider().acquire_count(), 2);
        let engines = converter.provider().engines();
        assert_eq!(engines.len(), 2);
        assert_eq!(engines[0].runs().len(), 3);
        assert_eq!(engines[1].runs().len(), 3);
    }

    #[tokio::test]
    async fn test_acquisition_failure_attempts_nothing() {
        let converter = HeicsConverter::new(MockEngineProvider::failing());

        let err = converter.convert(b"a", gif()).await.unwrap_err();

        assert!(err.is_acquisition_failure());
        assert_eq!(converter.provider().acquire_count(), 1);
    }
}

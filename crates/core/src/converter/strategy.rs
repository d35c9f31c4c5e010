//! Ordered fallback over stream hypotheses.

use tracing::{debug, warn};

use super::error::ConverterError;
use super::format::OutputFormat;
use super::graph::FilterGraphBuilder;
use super::traits::FrameEngine;
use super::types::{ConversionAttempt, PreprocessOptions, StreamHypothesis};
use crate::metrics::CONVERSION_ATTEMPTS;

/// The attempt that succeeded and how many runs it took to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyOutcome {
    pub attempt: ConversionAttempt,
    pub attempts: usize,
}

/// Tries each stream hypothesis in priority order until the engine succeeds.
#[derive(Debug, Clone, Copy)]
pub struct FallbackStrategy {
    hypotheses: &'static [StreamHypothesis],
}

impl Default for FallbackStrategy {
    fn default() -> Self {
        Self {
            hypotheses: &StreamHypothesis::PRIORITY,
        }
    }
}

impl FallbackStrategy {
    /// Returns the hypotheses in the order they are tried.
    pub fn hypotheses(&self) -> &'static [StreamHypothesis] {
        self.hypotheses
    }

    /// Runs attempts against an engine whose input is already staged.
    ///
    /// A non-success exit status moves on to the next hypothesis. Only
    /// running out of hypotheses is reported as [`ConverterError::Exhausted`];
    /// an engine that cannot be driven at all aborts immediately.
    pub async fn execute<E: FrameEngine + ?Sized>(
        &self,
        engine: &E,
        format: OutputFormat,
        options: &PreprocessOptions,
    ) -> Result<StrategyOutcome, ConverterError> {
        for (index, hypothesis) in self.hypotheses.iter().copied().enumerate() {
            let attempt = ConversionAttempt {
                index,
                hypothesis,
                args: FilterGraphBuilder::build(format, hypothesis, options),
            };
            let label = hypothesis.label();
            debug!(
                format = %format,
                hypothesis = %label,
                args = ?attempt.args,
                "Running conversion attempt"
            );

            let status = match engine.run(&attempt.args).await {
                Ok(status) => status,
                Err(e) => {
                    CONVERSION_ATTEMPTS
                        .with_label_values(&[format.as_str(), &label, "error"])
                        .inc();
                    return Err(ConverterError::Engine(e));
                }
            };

            if status.is_success() {
                CONVERSION_ATTEMPTS
                    .with_label_values(&[format.as_str(), &label, "success"])
                    .inc();
                return Ok(StrategyOutcome {
                    attempt,
                    attempts: index + 1,
                });
            }

            CONVERSION_ATTEMPTS
                .with_label_values(&[format.as_str(), &label, "failed"])
                .inc();
            warn!(
                format = %format,
                hypothesis = %label,
                code = ?status.code,
                "Conversion attempt failed, trying next stream layout"
            );
        }

        Err(ConverterError::Exhausted {
            format,
            attempts: self.hypotheses.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::error::EngineError;
    use crate::testing::MockEngine;

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let engine = MockEngine::new().succeed_on(StreamHypothesis::PRIORITY[0]);
        let outcome = FallbackStrategy::default()
            .execute(&engine, OutputFormat::Gif, &PreprocessOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.attempt.hypothesis, StreamHypothesis::PRIORITY[0]);
        assert_eq!(engine.runs().len(), 1);
    }

    #[tokio::test]
    async fn test_falls_through_to_no_alpha() {
        let engine = MockEngine::new().succeed_on(StreamHypothesis::NoAlpha);
        let outcome = FallbackStrategy::default()
            .execute(&engine, OutputFormat::Apng, &PreprocessOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.attempt.hypothesis, StreamHypothesis::NoAlpha);

        let runs = engine.runs();
        assert_eq!(runs.len(), 3);
        assert!(runs[0].iter().any(|a| a.starts_with("[0:v:2][0:v:3]")));
        assert!(runs[1].iter().any(|a| a.starts_with("[0:v:0][0:v:1]")));
        assert!(!runs[2].iter().any(|a| a.contains("alphamerge")));
    }

    #[tokio::test]
    async fn test_second_hypothesis_skips_third() {
        let engine = MockEngine::new().succeed_on(StreamHypothesis::PRIORITY[1]);
        let outcome = FallbackStrategy::default()
            .execute(&engine, OutputFormat::Webp, &PreprocessOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(engine.runs().len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion() {
        let engine = MockEngine::new();
        let err = FallbackStrategy::default()
            .execute(&engine, OutputFormat::Gif, &PreprocessOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConverterError::Exhausted {
                format: OutputFormat::Gif,
                attempts: 3
            }
        ));
        assert_eq!(engine.runs().len(), 3);
    }

    #[tokio::test]
    async fn test_engine_fault_aborts() {
        let engine = MockEngine::new()
            .succeed_on(StreamHypothesis::NoAlpha)
            .fail_runs_with(|| EngineError::Spawn {
                reason: "gone".to_string(),
            });
        let err = FallbackStrategy::default()
            .execute(&engine, OutputFormat::Gif, &PreprocessOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConverterError::Engine(EngineError::Spawn { .. })));
        assert_eq!(engine.runs().len(), 1);
    }

    #[test]
    fn test_default_order() {
        assert_eq!(
            FallbackStrategy::default().hypotheses(),
            &StreamHypothesis::PRIORITY[..]
        );
    }
}

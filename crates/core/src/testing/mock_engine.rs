//! Scripted engine and provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::converter::{
    ConverterError, EngineError, EngineProvider, EngineStatus, FrameEngine, StreamHypothesis,
};

/// Bytes a scripted engine writes on a successful run unless configured otherwise.
pub const DEFAULT_OUTPUT: &[u8] = b"MOCK-ANIMATION";

/// A recorded engine call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Stage { name: String, len: usize },
    Run { args: Vec<String> },
    Retrieve { name: String },
    Remove { name: String },
}

/// How a scripted engine behaves.
#[derive(Debug, Clone)]
struct Script {
    succeed_on: Vec<StreamHypothesis>,
    output: Vec<u8>,
    run_error: Option<fn() -> EngineError>,
    fail_stage: bool,
    fail_remove: bool,
    skip_output: bool,
    run_delay: Option<Duration>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            succeed_on: Vec::new(),
            output: DEFAULT_OUTPUT.to_vec(),
            run_error: None,
            fail_stage: false,
            fail_remove: false,
            skip_output: false,
            run_delay: None,
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    storage: HashMap<String, Vec<u8>>,
}

/// Mock implementation of the FrameEngine trait.
///
/// Every run fails with exit code 1 unless the hypothesis encoded in its
/// arguments was registered with [`MockEngine::succeed_on`]. A successful run
/// writes the configured output bytes under the last argument, which is the
/// output name. Clones share call history and storage.
///
/// # Example
///
/// ```rust,ignore
/// use heics_core::testing::MockEngine;
///
/// let engine = MockEngine::new().succeed_on(StreamHypothesis::NoAlpha);
/// // ... drive a FallbackStrategy ...
/// assert_eq!(engine.runs().len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    script: Script,
    state: Arc<Mutex<EngineState>>,
}

impl MockEngine {
    /// Create a new mock engine on which every run fails.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            state: Arc::default(),
        }
    }

    /// Make runs for `hypothesis` succeed.
    pub fn succeed_on(mut self, hypothesis: StreamHypothesis) -> Self {
        self.script.succeed_on.push(hypothesis);
        self
    }

    /// Set the bytes written on success.
    pub fn with_output(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.script.output = bytes.into();
        self
    }

    /// Make every run return an engine error instead of a status.
    pub fn fail_runs_with(mut self, error: fn() -> EngineError) -> Self {
        self.script.run_error = Some(error);
        self
    }

    /// Make staging fail.
    pub fn fail_stage(mut self) -> Self {
        self.script.fail_stage = true;
        self
    }

    /// Make every removal fail.
    pub fn fail_remove(mut self) -> Self {
        self.script.fail_remove = true;
        self
    }

    /// Report success without writing any output.
    pub fn skip_output(mut self) -> Self {
        self.script.skip_output = true;
        self
    }

    /// Make every run take `delay` before reporting.
    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.script.run_delay = Some(delay);
        self
    }

    /// All recorded calls in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Argument lists of every run, in order.
    pub fn runs(&self) -> Vec<Vec<String>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Run { args } => Some(args.clone()),
                _ => None,
            })
            .collect()
    }

    /// Names of removed entries, in order.
    pub fn removed(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Remove { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Names currently held in storage, sorted.
    pub fn stored_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.lock().storage.keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Recovers the hypothesis a run was built for from its arguments.
    pub fn hypothesis_of(args: &[String]) -> StreamHypothesis {
        StreamHypothesis::PRIORITY
            .iter()
            .copied()
            .find(|hypothesis| match hypothesis {
                StreamHypothesis::AlphaPair { color, alpha } => {
                    let merge = format!("[0:v:{}][0:v:{}]alphamerge", color, alpha);
                    args.iter().any(|a| a.starts_with(&merge))
                }
                StreamHypothesis::NoAlpha => false,
            })
            .unwrap_or(StreamHypothesis::NoAlpha)
    }
}

#[async_trait]
impl FrameEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stage(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Stage {
            name: name.to_string(),
            len: bytes.len(),
        });
        if self.script.fail_stage {
            return Err(EngineError::Io(std::io::Error::other("mock stage failure")));
        }
        state.storage.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn run(&self, args: &[String]) -> Result<EngineStatus, EngineError> {
        if let Some(delay) = self.script.run_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.calls.push(EngineCall::Run {
            args: args.to_vec(),
        });
        if let Some(error) = self.script.run_error {
            return Err(error());
        }

        if !self.script.succeed_on.contains(&Self::hypothesis_of(args)) {
            return Ok(EngineStatus::failure(1));
        }

        if !self.script.skip_output {
            if let Some(output_name) = args.last() {
                state
                    .storage
                    .insert(output_name.clone(), self.script.output.clone());
            }
        }
        Ok(EngineStatus::success())
    }

    async fn retrieve(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Retrieve {
            name: name.to_string(),
        });
        state
            .storage
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound {
                name: name.to_string(),
            })
    }

    async fn remove(&self, name: &str) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Remove {
            name: name.to_string(),
        });
        if self.script.fail_remove {
            return Err(EngineError::Io(std::io::Error::other("mock remove failure")));
        }
        state.storage.remove(name);
        Ok(())
    }
}

/// Mock implementation of the EngineProvider trait.
///
/// Hands out a fresh [`MockEngine`] with the same script on every acquire and
/// keeps a handle to each one for later inspection.
#[derive(Debug, Default)]
pub struct MockEngineProvider {
    template: MockEngine,
    fail_acquire: bool,
    acquired: Mutex<Vec<MockEngine>>,
    acquire_count: AtomicUsize,
}

impl MockEngineProvider {
    /// Create a provider whose engines follow the template's script.
    pub fn new(template: MockEngine) -> Self {
        Self {
            template,
            ..Default::default()
        }
    }

    /// Create a provider whose acquisitions always fail.
    pub fn failing() -> Self {
        Self {
            fail_acquire: true,
            ..Default::default()
        }
    }

    /// Number of acquire calls so far.
    pub fn acquire_count(&self) -> usize {
        self.acquire_count.load(Ordering::SeqCst)
    }

    /// Every engine handed out so far.
    pub fn engines(&self) -> Vec<MockEngine> {
        self.acquired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl EngineProvider for MockEngineProvider {
    type Engine = MockEngine;

    fn name(&self) -> &str {
        "mock"
    }

    async fn acquire(&self) -> Result<MockEngine, ConverterError> {
        self.acquire_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_acquire {
            return Err(ConverterError::acquisition("mock engine unavailable"));
        }

        let engine = MockEngine::with_script(self.template.script.clone());
        self.acquired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(engine.clone());
        Ok(engine)
    }
}

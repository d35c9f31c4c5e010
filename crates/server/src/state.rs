use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use heics_core::{Config, Converter, EncoderCapabilities, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    converter: Arc<dyn Converter>,
    capabilities: EncoderCapabilities,
    sessions: Semaphore,
}

impl AppState {
    pub fn new(
        config: Config,
        converter: Arc<dyn Converter>,
        capabilities: EncoderCapabilities,
    ) -> Self {
        let sessions = Semaphore::new(config.server.max_parallel_sessions);
        Self {
            config,
            converter,
            capabilities,
            sessions,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn converter(&self) -> &dyn Converter {
        self.converter.as_ref()
    }

    pub fn capabilities(&self) -> &EncoderCapabilities {
        &self.capabilities
    }

    /// Permits for concurrently running conversion sessions.
    pub fn sessions(&self) -> &Semaphore {
        &self.sessions
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.server.request_timeout_secs)
    }
}

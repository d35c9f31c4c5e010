//! FFmpeg-based engine implementation.
//!
//! Each engine owns a private temporary directory that serves as its
//! addressable storage. Logical names map to flat files inside it and ffmpeg
//! runs with that directory as its working directory, so the relative names
//! produced by the graph builder resolve there. Dropping the engine removes
//! the directory and kills any ffmpeg child still running.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use super::config::EngineConfig;
use super::error::{ConverterError, EngineError};
use super::traits::{EngineProvider, FrameEngine};
use super::types::EngineStatus;

/// Number of stderr lines kept when a run fails.
const STDERR_TAIL_LINES: usize = 8;

/// FFmpeg-based engine with its own working directory.
#[derive(Debug)]
pub struct FfmpegEngine {
    config: EngineConfig,
    dir: TempDir,
}

impl FfmpegEngine {
    /// Creates an engine storing its entries in `dir`.
    pub fn new(config: EngineConfig, dir: TempDir) -> Self {
        Self { config, dir }
    }

    /// Directory backing this engine's storage.
    pub fn work_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Maps a logical name onto a file inside the working directory.
    fn resolve(&self, name: &str) -> Result<PathBuf, EngineError> {
        let flat = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\\');
        if !flat {
            return Err(EngineError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.dir.path().join(name))
    }

    /// Prepends the global arguments every run carries.
    fn build_command_args(&self, args: &[String]) -> Vec<String> {
        let mut full = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
        ];
        full.extend(self.config.extra_args.iter().cloned());
        full.extend(args.iter().cloned());
        full
    }

    fn stderr_tail(stderr: &[u8]) -> String {
        let text = String::from_utf8_lossy(stderr);
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        lines[start..].join("\n")
    }
}

#[async_trait]
impl FrameEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn stage(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Staged input");
        Ok(())
    }

    async fn run(&self, args: &[String]) -> Result<EngineStatus, EngineError> {
        let full_args = self.build_command_args(args);

        let output = Command::new(&self.config.ffmpeg_path)
            .args(&full_args)
            .current_dir(self.dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::Spawn {
                        reason: format!("ffmpeg not found at {}", self.config.ffmpeg_path.display()),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        let status = EngineStatus::from(output.status);
        if !status.is_success() {
            debug!(
                code = ?status.code,
                stderr = %Self::stderr_tail(&output.stderr),
                "ffmpeg exited with failure"
            );
        }
        Ok(status)
    }

    async fn retrieve(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound {
                    name: name.to_string(),
                }
            } else {
                EngineError::Io(e)
            }
        })
    }

    async fn remove(&self, name: &str) -> Result<(), EngineError> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(EngineError::Io(e)),
        }
    }
}

/// Hands out a fresh [`FfmpegEngine`] per session.
#[derive(Debug, Clone)]
pub struct FfmpegEngineProvider {
    config: EngineConfig,
}

impl FfmpegEngineProvider {
    /// Creates a new provider with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Creates a provider with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Checks that the configured ffmpeg binary runs.
    pub async fn validate(&self) -> Result<(), ConverterError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match output {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(ConverterError::acquisition(format!(
                "ffmpeg -version exited with code {:?}",
                status.code()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConverterError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                })
            }
            Err(e) => Err(ConverterError::acquisition(e.to_string())),
        }
    }
}

#[async_trait]
impl EngineProvider for FfmpegEngineProvider {
    type Engine = FfmpegEngine;

    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn acquire(&self) -> Result<FfmpegEngine, ConverterError> {
        self.validate().await?;

        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|e| {
                ConverterError::acquisition(format!(
                    "cannot create {}: {}",
                    self.config.work_dir.display(),
                    e
                ))
            })?;

        let dir = tempfile::Builder::new()
            .prefix("session-")
            .tempdir_in(&self.config.work_dir)
            .map_err(|e| {
                warn!(work_dir = %self.config.work_dir.display(), error = %e, "Failed to create session directory");
                ConverterError::acquisition(format!("cannot create session directory: {}", e))
            })?;

        debug!(dir = %dir.path().display(), "Acquired ffmpeg engine");
        Ok(FfmpegEngine::new(self.config.clone(), dir))
    }
}

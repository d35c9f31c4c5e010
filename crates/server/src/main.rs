use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use heics_core::{
    load_config, load_config_from_env, validate_config, Config, Converter, EncoderCapabilities,
    FfmpegEngineProvider, HeicsConverter,
};

use heics_server::api::create_router;
use heics_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("heicsd {}", VERSION);

    let config = load(config_path())?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("FFmpeg binary: {:?}", config.engine.ffmpeg_path);
    info!("Session work dir: {:?}", config.engine.work_dir);
    info!(
        "Parallel sessions: {}, request timeout: {}s",
        config.server.max_parallel_sessions, config.server.request_timeout_secs
    );

    // Probe the engine once so problems show up at startup, not on first request
    let provider = FfmpegEngineProvider::new(config.engine.clone());
    if let Err(e) = provider.validate().await {
        warn!("FFmpeg is not usable yet, conversions will fail: {}", e);
    }

    let capabilities = EncoderCapabilities::detect(&config.engine).await;
    let available: Vec<&str> = capabilities
        .available_formats()
        .iter()
        .map(|f| f.as_str())
        .collect();
    info!("Available output formats: {:?}", available);
    if !capabilities.preserves_alpha() {
        warn!("alphamerge filter not detected, transparent stickers will fail to convert");
    }

    let converter: Arc<dyn Converter> = Arc::new(HeicsConverter::new(provider));

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), converter, capabilities));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Config file path from `HEICS_CONFIG`, defaulting to `config.toml`.
fn config_path() -> (PathBuf, bool) {
    match std::env::var("HEICS_CONFIG") {
        Ok(path) => (PathBuf::from(path), true),
        Err(_) => (PathBuf::from("config.toml"), false),
    }
}

/// Loads the config file, or defaults when the implicit file is absent.
///
/// An explicitly named file must exist.
fn load((path, explicit): (PathBuf, bool)) -> Result<Config> {
    if !explicit && !path.exists() {
        info!("No config file at {:?}, using defaults", path);
        return load_config_from_env().context("Failed to load config from environment");
    }

    info!("Loading configuration from {:?}", path);
    load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

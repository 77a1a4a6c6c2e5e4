//! Startup helpers for the Sentinel agent server.

use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;

use crate::chat::ProviderError;
use crate::config::{ConfigError, SentinelConfig};
use crate::directory::{DataError, build_provider};
use crate::server::{self, AppState};

/// Failures that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Completion provider could not be created.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// Directory provider could not be created.
    #[error("directory error: {0}")]
    Data(#[from] DataError),
    /// Runtime or listener failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the server until Ctrl-C (used by both binaries).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Sentinel Agent v{}", env!("CARGO_PKG_VERSION"));

    match serve() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Startup failed: {e}");
            ExitCode::from(1)
        }
    }
}

fn serve() -> Result<(), StartupError> {
    let config = SentinelConfig::from_env()?;
    let state = initialize(&config)?;
    let directory = build_provider(&config.data)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        state.spawn_directory_load(directory);
        server::run_server_with_shutdown(state, config.server.port, shutdown_signal()).await
    })?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if the completion provider cannot be created.
pub fn initialize(config: &SentinelConfig) -> Result<Arc<AppState>, StartupError> {
    match &config.llm.base_url {
        Some(url) => tracing::info!("Ollama endpoint: {url}"),
        None => tracing::info!("Ollama endpoint: client default"),
    }
    tracing::info!(model = %config.llm.model, "completion model");

    Ok(AppState::new(config)?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

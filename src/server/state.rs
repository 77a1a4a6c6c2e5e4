//! Application state shared across all request handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::chat::{ChatSession, CompletionProvider, OllamaCompletionProvider, ProviderResult};
use crate::config::SentinelConfig;
use crate::directory::{
    ConnectionStatus, DataProvider, DirectorySnapshot, EvacuationPoint, ServiceEntity,
    load_directory,
};

/// Directory load state as reported by `/api/status`.
#[derive(Clone, Debug, Default)]
pub struct DirectoryState {
    /// Connection status.
    pub status: ConnectionStatus,
    /// Loaded records, once connected.
    pub snapshot: Option<DirectorySnapshot>,
    /// Last load error.
    pub error: Option<String>,
}

/// Status payload.
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    /// Connection status.
    pub status: ConnectionStatus,
    /// When the directory finished loading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
    /// Load error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared application state.
pub struct AppState {
    /// The single chat session.
    pub session: Arc<ChatSession>,
    /// Configured completion model.
    pub model_name: String,
    directory: RwLock<DirectoryState>,
}

impl AppState {
    /// Create state backed by the Ollama provider from `config`.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be created.
    pub fn new(config: &SentinelConfig) -> ProviderResult<Arc<Self>> {
        let provider = OllamaCompletionProvider::new(&config.llm)?;
        Ok(Self::with_provider(Arc::new(provider), config))
    }

    /// Create state around an arbitrary completion provider.
    #[must_use]
    pub fn with_provider(provider: Arc<dyn CompletionProvider>, config: &SentinelConfig) -> Arc<Self> {
        Arc::new(Self {
            session: Arc::new(ChatSession::new(provider, &config.session)),
            model_name: config.llm.model.clone(),
            directory: RwLock::new(DirectoryState::default()),
        })
    }

    /// Current status report.
    pub async fn status(&self) -> StatusReport {
        let directory = self.directory.read().await;
        StatusReport {
            status: directory.status,
            loaded_at: directory.snapshot.as_ref().map(|s| s.loaded_at),
            error: directory.error.clone(),
        }
    }

    /// Loaded services, or `None` while not connected.
    pub async fn services(&self) -> Option<Vec<ServiceEntity>> {
        self.directory
            .read()
            .await
            .snapshot
            .as_ref()
            .map(|s| s.services.clone())
    }

    /// Loaded evacuation points, or `None` while not connected.
    pub async fn evacuation_points(&self) -> Option<Vec<EvacuationPoint>> {
        self.directory
            .read()
            .await
            .snapshot
            .as_ref()
            .map(|s| s.evacuation_points.clone())
    }

    /// Load the directory from `provider` and record the outcome.
    pub async fn refresh_directory(&self, provider: &dyn DataProvider) {
        self.directory.write().await.status = ConnectionStatus::Connecting;

        let result = load_directory(provider).await;
        let mut directory = self.directory.write().await;
        match result {
            Ok(snapshot) => {
                info!(provider = provider.name(), "directory connected");
                directory.status = ConnectionStatus::Connected;
                directory.snapshot = Some(snapshot);
                directory.error = None;
            }
            Err(err) => {
                error!(provider = provider.name(), error = %err, "directory load failed");
                directory.status = ConnectionStatus::Error;
                directory.error = Some(err.to_string());
            }
        }
    }

    /// Spawn [`Self::refresh_directory`] on the runtime.
    pub fn spawn_directory_load(self: &Arc<Self>, provider: Arc<dyn DataProvider>) -> JoinHandle<()> {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            state.refresh_directory(provider.as_ref()).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::provider::scripted::ScriptedProvider;
    use crate::config::{FallbackPolicy, MockLatency};
    use crate::directory::{HttpDataProvider, MockDataProvider};

    fn state() -> Arc<AppState> {
        AppState::with_provider(
            Arc::new(ScriptedProvider::new(Vec::new())),
            &SentinelConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_starts_connecting_without_data() {
        let state = state();
        assert_eq!(state.status().await.status, ConnectionStatus::Connecting);
        assert!(state.services().await.is_none());
        assert!(state.evacuation_points().await.is_none());
    }

    #[tokio::test]
    async fn test_background_load_connects() {
        let state = state();
        let handle = state.spawn_directory_load(Arc::new(MockDataProvider::new(MockLatency::ZERO)));
        handle.await.unwrap();

        let report = state.status().await;
        assert_eq!(report.status, ConnectionStatus::Connected);
        assert!(report.loaded_at.is_some());
        assert_eq!(state.services().await.map(|s| s.len()), Some(9));
        assert_eq!(state.evacuation_points().await.map(|p| p.len()), Some(5));
    }

    #[tokio::test]
    async fn test_failed_load_reports_error() {
        let state = state();
        // Port 9 (discard) on loopback is expected to refuse connections.
        let provider =
            HttpDataProvider::new("http://127.0.0.1:9/api", FallbackPolicy::FailHard).unwrap();
        state.refresh_directory(&provider).await;

        let report = state.status().await;
        assert_eq!(report.status, ConnectionStatus::Error);
        assert!(report.error.is_some());
    }
}

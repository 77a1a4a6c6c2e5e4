//! Streaming completion provider backed by Rig's Ollama client.

use futures::StreamExt;
use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::{CompletionModel, Message};
use rig::providers::ollama;
use rig::streaming::StreamedAssistantContent;
use tracing::debug;

use crate::chat::errors::{ProviderError, ProviderResult};
use crate::chat::provider::{CompletionProvider, CompletionRequest, ProviderFuture, TextStream};
use crate::chat::turn::{HistoryEntry, Role};
use crate::config::LlmConfig;

/// Ollama-backed streaming provider.
pub struct OllamaCompletionProvider {
    model: ollama::CompletionModel,
    model_name: String,
    temperature: f64,
    max_tokens: Option<u64>,
    system_instruction: String,
}

impl OllamaCompletionProvider {
    /// Create a provider from the completion model config.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &LlmConfig) -> ProviderResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(rig::client::Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(ProviderError::from)?;
        let model = client.completion_model(config.model.clone());

        Ok(Self {
            model,
            model_name: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_instruction: config.system_instruction.clone(),
        })
    }

    /// Configured model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl CompletionProvider for OllamaCompletionProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn open_stream(&self, request: CompletionRequest) -> ProviderFuture<'_, ProviderResult<TextStream>> {
        Box::pin(async move {
            if request.message.trim().is_empty() {
                return Err(ProviderError::EmptyRequest(
                    "user message is blank".to_string(),
                ));
            }

            let history = to_rig_history(&request.history);
            debug!(
                model = %self.model_name,
                history_len = history.len(),
                "opening ollama stream"
            );

            let mut builder = self
                .model
                .completion_request(request.message)
                .messages(history)
                .preamble(self.system_instruction.clone())
                .temperature(self.temperature);
            if let Some(max_tokens) = self.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }

            let response = builder.stream().await?;
            let fragments = response.filter_map(|item| async move {
                match item {
                    Ok(StreamedAssistantContent::Text(text)) => Some(Ok(text.text)),
                    // Tool calls, reasoning and the final summary are opaque to the session.
                    Ok(_) => None,
                    Err(err) => Some(Err(ProviderError::Completion(err))),
                }
            });

            Ok(fragments.boxed())
        })
    }
}

/// Map conversation history to Rig messages, skipping turns without text.
fn to_rig_history(history: &[HistoryEntry]) -> Vec<Message> {
    history
        .iter()
        .filter(|entry| !entry.text.trim().is_empty())
        .map(|entry| match entry.role {
            Role::User => Message::user(entry.text.clone()),
            Role::Model => Message::assistant(entry.text.clone()),
        })
        .collect()
}

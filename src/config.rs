//! Runtime configuration for the Sentinel agent.
//!
//! Every section has a sensible `Default`; [`SentinelConfig::from_env`]
//! layers `SENTINEL_*` environment overrides on top.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default completion model tag served by the local Ollama runtime.
pub const DEFAULT_MODEL: &str = "ministral-3:8b-instruct-2512-q8_0";

/// Default HTTP port for the server shell.
pub const DEFAULT_PORT: u16 = 3000;

const ENV_OLLAMA_URL: &str = "SENTINEL_OLLAMA_URL";
const ENV_MODEL: &str = "SENTINEL_MODEL";
const ENV_TEMPERATURE: &str = "SENTINEL_TEMPERATURE";
const ENV_PORT: &str = "SENTINEL_PORT";
const ENV_DATA_URL: &str = "SENTINEL_DATA_URL";
const ENV_DATA_POLICY: &str = "SENTINEL_DATA_POLICY";

const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are the Sentinel AI Emergency Assistant. Your role is to assist users in a fire protection and emergency management system.
You have expertise in:
- Fire safety procedures (classes of fire, extinguisher types, evacuation protocols).
- Medical first aid (CPR, treating burns, bleeding, shock).
- Hazardous material handling.
- Emergency resource allocation logic.

Guidelines:
- Be concise, clear, and authoritative but calm.
- Prioritize human safety above all else.
- If a user reports an immediate life-threatening emergency, tell them to call local emergency services (911/112) immediately, then offer immediate first-aid advice.
- Format responses using Markdown (lists, bold text for key steps).
- If asked about location-specific services, use the map lookup tool to find real places if available, or explain you are simulating a database connection.

You have access to a simulated database of services (Police, Fire, Hospital, Water, etc.). If the user asks about the specific data in the app (like \"Which fire station is offline?\"), you won't know unless they provide that context, so generalize your answer or ask for the data.";

const DEFAULT_WELCOME_MESSAGE: &str = "Hello. I am Sentinel AI. I can assist with emergency procedures, first aid protocols, and locating services. How can I help you today?";

const DEFAULT_ERROR_MESSAGE: &str =
    "I encountered a connection error. Please try again or check your network.";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or otherwise unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// An environment variable could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
    /// A URL failed to parse.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Completion model settings.
    pub llm: LlmConfig,
    /// Chat session settings.
    pub session: SessionConfig,
    /// Directory data source settings.
    pub data: DataConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl SentinelConfig {
    /// Build a config from defaults plus `SENTINEL_*` environment overrides.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config using `lookup` as the variable source.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = var(ENV_OLLAMA_URL) {
            config.llm.base_url = Some(url);
        }
        if let Some(model) = var(ENV_MODEL) {
            config.llm.model = model;
        }
        if let Some(raw) = var(ENV_TEMPERATURE) {
            config.llm.temperature = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_TEMPERATURE,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = var(ENV_PORT) {
            config.server.port = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_PORT,
                value: raw.clone(),
            })?;
        }
        if let Some(url) = var(ENV_DATA_URL) {
            config.data.base_url = Some(url);
        }
        if let Some(raw) = var(ENV_DATA_POLICY) {
            config.data.policy = raw.parse().map_err(|()| ConfigError::InvalidEnv {
                name: ENV_DATA_POLICY,
                value: raw.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.session.welcome_message.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "session.welcome_message must not be empty".to_string(),
            ));
        }

        if self.session.error_message.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "session.error_message must not be empty".to_string(),
            ));
        }

        if let Some(base_url) = &self.llm.base_url {
            Url::parse(base_url)?;
        }

        if let Some(base_url) = &self.data.base_url {
            Url::parse(base_url)?;
        }

        Ok(())
    }
}

/// Completion model settings.
///
/// No tool definitions are registered with the model. Location lookups are
/// left to whatever the backend provides, and any tool traffic in the
/// response stream is skipped.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama model tag.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Optional response token cap.
    pub max_tokens: Option<u64>,
    /// System preamble sent with every request.
    pub system_instruction: String,
    /// Optional Ollama base URL override.
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.4,
            max_tokens: None,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            base_url: None,
        }
    }
}

/// Chat session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Model turn seeded into every new conversation.
    pub welcome_message: String,
    /// Text substituted for a response whose stream failed.
    pub error_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }
}

/// What a data provider does when its backend is unreachable.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Log and serve the bundled fixtures.
    #[default]
    FailSoft,
    /// Surface the error to the caller.
    FailHard,
}

impl std::str::FromStr for FallbackPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-soft" | "soft" => Ok(Self::FailSoft),
            "fail-hard" | "hard" => Ok(Self::FailHard),
            _ => Err(()),
        }
    }
}

/// Directory data source settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    /// Backend API root; the bundled mock is used when unset.
    pub base_url: Option<String>,
    /// Behavior when the backend fails.
    pub policy: FallbackPolicy,
    /// Simulated latencies for the mock provider.
    pub latency: MockLatency,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            policy: FallbackPolicy::FailSoft,
            latency: MockLatency::default(),
        }
    }
}

/// Simulated mock provider latencies, in milliseconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MockLatency {
    /// Delay before `connect` resolves.
    pub connect_ms: u64,
    /// Delay before services are returned.
    pub services_ms: u64,
    /// Delay before evacuation points are returned.
    pub points_ms: u64,
}

impl MockLatency {
    /// No simulated delay.
    pub const ZERO: Self = Self {
        connect_ms: 0,
        services_ms: 0,
        points_ms: 0,
    };

    /// Connect delay.
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    /// Services fetch delay.
    #[must_use]
    pub const fn services(&self) -> Duration {
        Duration::from_millis(self.services_ms)
    }

    /// Evacuation points fetch delay.
    #[must_use]
    pub const fn points(&self) -> Duration {
        Duration::from_millis(self.points_ms)
    }
}

impl Default for MockLatency {
    fn default() -> Self {
        Self {
            connect_ms: 1500,
            services_ms: 800,
            points_ms: 600,
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port on all interfaces.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = SentinelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.data.policy, FallbackPolicy::FailSoft);
        assert!((config.llm.temperature - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_env_overrides_applied() {
        let config = SentinelConfig::from_lookup(lookup(&[
            (ENV_MODEL, "llama3"),
            (ENV_TEMPERATURE, "0.1"),
            (ENV_PORT, "8080"),
            (ENV_OLLAMA_URL, "http://ollama:11434"),
            (ENV_DATA_URL, "http://localhost:3000/api"),
            (ENV_DATA_POLICY, "fail-hard"),
        ]));

        let config = config.unwrap();
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.base_url.as_deref(), Some("http://ollama:11434"));
        assert_eq!(config.data.base_url.as_deref(), Some("http://localhost:3000/api"));
        assert_eq!(config.data.policy, FallbackPolicy::FailHard);
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let config = SentinelConfig::from_lookup(lookup(&[(ENV_MODEL, "  ")])).unwrap();
        assert_eq!(config.llm.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_unparseable_port_rejected() {
        let result = SentinelConfig::from_lookup(lookup(&[(ENV_PORT, "eighty")]));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { name: ENV_PORT, .. })));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result = SentinelConfig::from_lookup(lookup(&[(ENV_DATA_POLICY, "maybe")]));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_temperature_out_of_range() {
        let mut config = SentinelConfig::default();
        config.llm.temperature = 2.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_url_rejected() {
        let mut config = SentinelConfig::default();
        config.data.base_url = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Url(_))));
    }

    #[test]
    fn test_empty_messages_rejected() {
        let mut config = SentinelConfig::default();
        config.session.error_message = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_llm_config_carries_only_request_settings() {
        let json = serde_json::to_value(LlmConfig::default()).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["base_url", "max_tokens", "model", "system_instruction", "temperature"]
        );
    }

    #[test]
    fn test_policy_round_trips_kebab_case() {
        let json = serde_json::to_string(&FallbackPolicy::FailHard).unwrap();
        assert_eq!(json, "\"fail-hard\"");
        assert_eq!("Fail-Soft".parse::<FallbackPolicy>(), Ok(FallbackPolicy::FailSoft));
    }
}

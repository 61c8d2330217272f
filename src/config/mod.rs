//! Configuration management for gemini-relay
//!
//! Supports configuration via:
//! 1. Config file (~/.config/gemini-relay/config.toml)
//! 2. Environment variables (GEMINI_API_KEY, GEMINI_BASE_URL, GEMINI_MODEL)
//! 3. CLI arguments (override file/env settings)

use crate::api::{RelayOptions, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini provider configuration
    pub gemini: GeminiSettings,

    /// Relay behaviour
    pub relay: RelaySettings,
}

/// Gemini provider settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// API key (can also use GEMINI_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL for the Gemini API
    pub base_url: String,

    /// Default model to use
    pub model: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gemini-pro".to_string(),
        }
    }
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Timeout for a full generation, streaming or not
    pub generation_timeout_secs: u64,

    /// Timeout for short-label generation
    pub label_timeout_secs: u64,

    /// Maximum lines read from one stream before it is cut off
    pub max_stream_lines: usize,

    /// Return accumulated text alongside streaming errors
    pub keep_partial_on_error: bool,

    /// Maximum characters in a generated label
    pub label_max_chars: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        let options = RelayOptions::default();
        Self {
            generation_timeout_secs: options.generation_timeout.as_secs(),
            label_timeout_secs: options.label_timeout.as_secs(),
            max_stream_lines: options.max_stream_lines,
            keep_partial_on_error: options.keep_partial_on_error,
            label_max_chars: options.label_max_chars,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gemini-relay")
            .join("config.toml")
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load config from specific path
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            self.gemini.base_url = url;
        }
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            self.gemini.model = model;
        }

        self
    }

    /// Save config to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path())
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gemini_api_key().is_none() {
            return Err(ConfigError::MissingRequired(
                "Gemini API key (set GEMINI_API_KEY or gemini.api_key)".to_string(),
            ));
        }
        if self.relay.max_stream_lines == 0 {
            return Err(ConfigError::Invalid(
                "relay.max_stream_lines must be at least 1".to_string(),
            ));
        }
        if self.relay.generation_timeout_secs == 0 || self.relay.label_timeout_secs == 0 {
            return Err(ConfigError::Invalid("relay timeouts must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Gemini API key from config, ignoring blank values
    pub fn gemini_api_key(&self) -> Option<String> {
        self.gemini
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            max_stream_lines: self.relay.max_stream_lines,
            keep_partial_on_error: self.relay.keep_partial_on_error,
            generation_timeout: Duration::from_secs(self.relay.generation_timeout_secs),
            label_timeout: Duration::from_secs(self.relay.label_timeout_secs),
            label_max_chars: self.relay.label_max_chars,
        }
    }

    /// Generate example config content
    pub fn example() -> String {
        let example = Config::default();
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gemini.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.gemini.model = model.into();
        self
    }

    pub fn max_stream_lines(mut self, lines: usize) -> Self {
        self.config.relay.max_stream_lines = lines;
        self
    }

    pub fn keep_partial_on_error(mut self, keep: bool) -> Self {
        self.config.relay.keep_partial_on_error = keep;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Configuration loading, validation, and management for Salin.
//!
//! Loads configuration from `~/.salin/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.salin/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default completion provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature for conversation turns
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per conversation turn
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Nucleus sampling for conversation turns
    #[serde(default = "default_top_p")]
    pub default_top_p: f32,

    /// Conversation loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Reflection pipeline settings
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2-instruct".into()
}
fn default_temperature() -> f32 {
    0.6
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_top_p() -> f32 {
    1.0
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("default_top_p", &self.default_top_p)
            .field("agent", &self.agent)
            .field("judge", &self.judge)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// Conversation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// System prompt placed at the head of every conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Model calls allowed per user turn before giving up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Stream model output token by token
    #[serde(default)]
    pub stream: bool,
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_iterations: default_max_iterations(),
            stream: false,
        }
    }
}

/// Reflection pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Model for judge calls; falls back to `default_model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_judge_temperature")]
    pub temperature: f32,

    #[serde(default = "default_judge_max_tokens")]
    pub max_tokens: u32,

    /// Whole-pipeline attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Reject judgments whose score, sum and criteria disagree
    #[serde(default = "default_true")]
    pub validate_schema: bool,
}

fn default_judge_temperature() -> f32 {
    0.2
}
fn default_judge_max_tokens() -> u32 {
    2048
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_backoff_ms() -> u64 {
    8000
}
fn default_true() -> bool {
    true
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: default_judge_temperature(),
            max_tokens: default_judge_max_tokens(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            validate_schema: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.salin/config.toml).
    ///
    /// API key environment variables, checked in order when the file has none:
    /// - `SALIN_API_KEY`
    /// - `GROQ_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("SALIN_API_KEY")
                .or_else(|| lookup("GROQ_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("SALIN_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("SALIN_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".salin")
    }

    /// The model judge calls should use.
    pub fn judge_model(&self) -> &str {
        self.judge.model.as_deref().unwrap_or(&self.default_model)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("default_temperature", self.default_temperature),
            ("judge.temperature", self.judge.temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{field} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.default_top_p <= 0.0 || self.default_top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "default_top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.judge.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "judge.max_attempts must be at least 1".into(),
            ));
        }

        if self.judge.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "judge.backoff_multiplier must be >= 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config --init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            default_top_p: default_top_p(),
            agent: AgentConfig::default(),
            judge: JudgeConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

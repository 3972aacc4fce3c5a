//! Configuration loading, validation, and management for tinyreact.
//!
//! Loads configuration from `~/.tinyreact/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tinyreact_core::agent::{AgentConfig, CompactionSettings};

/// The root configuration structure.
///
/// Maps directly to `~/.tinyreact/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the HTTP provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Which provider implementation to build
    #[serde(default)]
    pub provider: ProviderKind,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response (unset lets the backend decide)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Subprocess provider settings, used when `provider = "command"`
    #[serde(default)]
    pub command: CommandConfig,

    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub compaction: CompactionConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_base_url() -> String {
    "https://api.deepseek.com/v1".into()
}
fn default_model() -> String {
    "deepseek-chat".into()
}
fn default_temperature() -> f32 {
    0.7
}

/// Redact a secret string for Debug output.
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
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("command", &self.command)
            .field("agent", &self.agent)
            .field("compaction", &self.compaction)
            .field("retry", &self.retry)
            .finish()
    }
}

/// LLM backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Any `/chat/completions` endpoint (DeepSeek, OpenRouter, OpenAI, ...)
    #[default]
    OpenaiCompat,
    /// A local program that reads a transcript on stdin
    Command,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default)]
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default = "default_agent_description")]
    pub description: String,

    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(default = "default_max_parallel_tools")]
    pub max_parallel_tools: usize,

    #[serde(default = "default_timeout_secs")]
    pub tool_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Directory the file and command tools are confined to
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Knowledge files loaded into every system prompt, in order
    #[serde(default)]
    pub knowledge_files: Vec<PathBuf>,
}

fn default_agent_name() -> String {
    "main".into()
}
fn default_agent_description() -> String {
    "A general purpose ReAct agent".into()
}
fn default_max_rounds() -> u32 {
    100
}
fn default_max_depth() -> u32 {
    10
}
fn default_max_parallel_tools() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            description: default_agent_description(),
            max_rounds: default_max_rounds(),
            max_depth: default_max_depth(),
            max_parallel_tools: default_max_parallel_tools(),
            tool_timeout_secs: default_timeout_secs(),
            llm_timeout_secs: default_timeout_secs(),
            work_dir: default_work_dir(),
            knowledge_files: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_threshold_tokens")]
    pub threshold_tokens: usize,

    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,

    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: usize,
}

fn default_threshold_tokens() -> usize {
    50_000
}
fn default_keep_recent() -> usize {
    10
}
fn default_summary_max_tokens() -> usize {
    2_000
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            threshold_tokens: default_threshold_tokens(),
            keep_recent: default_keep_recent(),
            summary_max_tokens: default_summary_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tinyreact/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `TINYREACT_API_KEY` (highest priority)
    /// - `DEEPSEEK_API_KEY`
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    /// Apply environment overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = ["TINYREACT_API_KEY", "DEEPSEEK_API_KEY", "OPENROUTER_API_KEY", "OPENAI_API_KEY"]
                .iter()
                .find_map(|key| lookup(key).filter(|v| !v.is_empty()));
        }

        if let Some(model) = lookup("TINYREACT_MODEL") {
            self.model = model;
        }

        if let Some(base_url) = lookup("TINYREACT_BASE_URL") {
            self.base_url = base_url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tinyreact")
    }

    /// Directory holding persisted per-agent state.
    pub fn state_dir() -> PathBuf {
        Self::config_dir().join("agents")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.name.trim().is_empty() {
            return Err(ConfigError::ValidationError("agent.name must not be empty".into()));
        }
        if self.agent.max_rounds == 0 {
            return Err(ConfigError::ValidationError("agent.max_rounds must be >= 1".into()));
        }
        if self.agent.max_depth == 0 {
            return Err(ConfigError::ValidationError("agent.max_depth must be >= 1".into()));
        }
        if self.agent.max_parallel_tools == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_parallel_tools must be >= 1".into(),
            ));
        }
        if self.compaction.keep_recent == 0 {
            return Err(ConfigError::ValidationError(
                "compaction.keep_recent must be >= 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError("retry.max_attempts must be >= 1".into()));
        }
        if self.provider == ProviderKind::Command && self.command.program.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "command.program is required when provider = \"command\"".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The agent configuration described by this file.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            name: self.agent.name.clone(),
            description: self.agent.description.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            max_rounds: self.agent.max_rounds,
            max_depth: self.agent.max_depth,
            max_parallel_tools: self.agent.max_parallel_tools,
            tool_timeout_secs: self.agent.tool_timeout_secs,
            llm_timeout_secs: self.agent.llm_timeout_secs,
            compaction: CompactionSettings {
                threshold_tokens: self.compaction.threshold_tokens,
                keep_recent: self.compaction.keep_recent,
                summary_max_tokens: self.compaction.summary_max_tokens,
            },
        }
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderKind::default(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            command: CommandConfig::default(),
            agent: AgentSection::default(),
            compaction: CompactionConfig::default(),
            retry: RetryConfig::default(),
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

impl From<ConfigError> for tinyreact_core::Error {
    fn from(e: ConfigError) -> Self {
        tinyreact_core::Error::Config { message: e.to_string() }
    }
}

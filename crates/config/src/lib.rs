//! Configuration loading, validation, and management for Bolty.
//!
//! Loads configuration from `~/.bolty/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project types the system instruction can target.
pub const PROJECT_TYPES: &[&str] = &["react", "nextjs", "react-native"];

/// Store backends understood by the CLI.
pub const STORE_BACKENDS: &[&str] = &["memory", "file"];

/// The root configuration structure.
///
/// Maps directly to `~/.bolty/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model backend ("gemini" or an OpenAI-compatible name)
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Override the backend's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Models tried in order before any discovered ones
    #[serde(default = "default_preferred_models")]
    pub preferred_models: Vec<String>,

    /// Max output tokens per generation
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Sampling temperature, 0.0 to 1.0
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Project type the system instruction targets
    #[serde(default = "default_project_type")]
    pub project_type: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

fn default_backend() -> String {
    "gemini".into()
}
fn default_preferred_models() -> Vec<String> {
    vec![
        "gemini-2.5-flash".into(),
        "gemini-2.0-flash-exp".into(),
        "gemini-1.5-flash".into(),
    ]
}
fn default_max_output_tokens() -> u32 {
    9000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_project_type() -> String {
    "react-native".into()
}
fn default_request_timeout_secs() -> u64 {
    120
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
            .field("backend", &self.backend)
            .field("api_url", &self.api_url)
            .field("preferred_models", &self.preferred_models)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .field("project_type", &self.project_type)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("retry", &self.retry)
            .field("concurrency", &self.concurrency)
            .field("workspace", &self.workspace)
            .field("store", &self.store)
            .finish()
    }
}

/// Per-model retry budget and backoff base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per model before falling back
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    6
}
fn default_base_delay_ms() -> u64 {
    400
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Generations allowed in flight at once, process-wide
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_max_in_flight() -> usize {
    3
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root under which each project gets its own directory
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// First words of permitted shell commands. Empty allows everything.
    #[serde(default)]
    pub allowed_commands: Vec<String>,
}

fn default_base_dir() -> String {
    "/tmp/bolty-worker".into()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            allowed_commands: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "file" (JSONL) or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// JSONL file path; defaults to `~/.bolty/conversations.jsonl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_store_backend() -> String {
    "file".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.bolty/config.toml).
    ///
    /// Environment overrides:
    /// - `BOLTY_API_KEY`, then `GEMINI_API_KEY`, then `GOOGLE_API_KEY`
    /// - `BOLTY_BACKEND`
    /// - `BOLTY_MODELS` (comma-separated)
    /// - `BOLTY_WORKSPACE_DIR`
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

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("BOLTY_API_KEY")
                .or_else(|| lookup("GEMINI_API_KEY"))
                .or_else(|| lookup("GOOGLE_API_KEY"));
        }

        if let Some(backend) = lookup("BOLTY_BACKEND") {
            self.backend = backend;
        }

        if let Some(models) = lookup("BOLTY_MODELS") {
            let models: Vec<String> = models
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
            if !models.is_empty() {
                self.preferred_models = models;
            }
        }

        if let Some(dir) = lookup("BOLTY_WORKSPACE_DIR") {
            self.workspace.base_dir = dir;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".bolty")
    }

    /// Path of the JSONL conversation store.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("conversations.jsonl"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.max_output_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_output_tokens must be > 0".into(),
            ));
        }

        if self.retry.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_retries must be at least 1".into(),
            ));
        }

        if self.concurrency.max_in_flight == 0 {
            return Err(ConfigError::ValidationError(
                "concurrency.max_in_flight must be at least 1".into(),
            ));
        }

        if !PROJECT_TYPES.contains(&self.project_type.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "project_type must be one of {PROJECT_TYPES:?}, got '{}'",
                self.project_type
            )));
        }

        if !STORE_BACKENDS.contains(&self.store.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be one of {STORE_BACKENDS:?}, got '{}'",
                self.store.backend
            )));
        }

        if self.workspace.base_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "workspace.base_dir must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            backend: default_backend(),
            api_url: None,
            preferred_models: default_preferred_models(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            project_type: default_project_type(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            workspace: WorkspaceConfig::default(),
            store: StoreConfig::default(),
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

impl From<ConfigError> for bolty_core::Error {
    fn from(e: ConfigError) -> Self {
        bolty_core::Error::Config {
            message: e.to_string(),
        }
    }
}

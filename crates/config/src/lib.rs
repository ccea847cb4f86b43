//! Configuration loading, validation, and management for Rollcall.
//!
//! Loads configuration from `~/.rollcall/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use rollcall_core::Status;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.rollcall/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default oracle provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model; must accept image input
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per oracle response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Candidate-name extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Matching call settings
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Report export settings
    #[serde(default)]
    pub export: ExportConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "openai/gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    8192
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
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("extraction", &self.extraction)
            .field("matching", &self.matching)
            .field("export", &self.export)
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

/// What to do when one session capture cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFailurePolicy {
    /// Skip the capture, log a warning, report it with the run
    Warn,
    /// Abort the whole run
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// A roster cell must be strictly longer than this (in characters)
    #[serde(default = "default_min_roster_cell_chars")]
    pub min_roster_cell_chars: usize,

    /// A roster cell must have at least this many whitespace-separated tokens
    #[serde(default = "default_min_roster_tokens")]
    pub min_roster_tokens: usize,

    /// An oracle-extracted name must be strictly longer than this
    #[serde(default = "default_min_oracle_name_chars")]
    pub min_oracle_name_chars: usize,

    /// Reject image files larger than this
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    #[serde(default = "default_image_failure_policy")]
    pub image_failure_policy: ImageFailurePolicy,
}

fn default_min_roster_cell_chars() -> usize {
    5
}
fn default_min_roster_tokens() -> usize {
    2
}
fn default_min_oracle_name_chars() -> usize {
    2
}
fn default_max_image_bytes() -> u64 {
    20 * 1024 * 1024
}
fn default_image_failure_policy() -> ImageFailurePolicy {
    ImageFailurePolicy::Warn
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_roster_cell_chars: default_min_roster_cell_chars(),
            min_roster_tokens: default_min_roster_tokens(),
            min_oracle_name_chars: default_min_oracle_name_chars(),
            max_image_bytes: default_max_image_bytes(),
            image_failure_policy: default_image_failure_policy(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Upper bound for a single oracle round-trip
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Reject matching responses that carry fields beyond the three buckets
    #[serde(default = "default_true")]
    pub strict_response: bool,
}

fn default_request_timeout_secs() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            strict_response: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Field delimiter for CSV reports
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Label written for each status
    #[serde(default)]
    pub status_labels: StatusLabels,
}

fn default_delimiter() -> String {
    ",".into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            status_labels: StatusLabels::default(),
        }
    }
}

impl ExportConfig {
    pub fn label(&self, status: Status) -> &str {
        match status {
            Status::Present => &self.status_labels.present,
            Status::Absent => &self.status_labels.absent,
            Status::Unexpected => &self.status_labels.unexpected,
        }
    }

    /// The delimiter as a byte, if it is a single ASCII character.
    pub fn delimiter_byte(&self) -> Option<u8> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => Some(*b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusLabels {
    #[serde(default = "default_present_label")]
    pub present: String,
    #[serde(default = "default_absent_label")]
    pub absent: String,
    #[serde(default = "default_unexpected_label")]
    pub unexpected: String,
}

fn default_present_label() -> String {
    "Present".into()
}
fn default_absent_label() -> String {
    "Absent".into()
}
fn default_unexpected_label() -> String {
    "Unexpected".into()
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            present: default_present_label(),
            absent: default_absent_label(),
            unexpected: default_unexpected_label(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.rollcall/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `ROLLCALL_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    /// - `ANTHROPIC_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("ROLLCALL_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("ANTHROPIC_API_KEY"));
        }

        if let Some(provider) = lookup("ROLLCALL_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("ROLLCALL_MODEL") {
            self.default_model = model;
        }
    }

    /// Load configuration from a specific file path. A missing file means
    /// defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rollcall")
    }

    /// Get the directory reports are written to by default.
    pub fn reports_dir() -> PathBuf {
        Self::config_dir().join("reports")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.extraction.min_roster_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "extraction.min_roster_tokens must be at least 1".into(),
            ));
        }

        if self.matching.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "matching.request_timeout_secs must be > 0".into(),
            ));
        }

        if self.export.delimiter_byte().is_none() {
            return Err(ConfigError::ValidationError(
                "export.delimiter must be a single ASCII character".into(),
            ));
        }

        let labels = &self.export.status_labels;
        if [&labels.present, &labels.absent, &labels.unexpected]
            .iter()
            .any(|l| l.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "export.status_labels must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Model for `provider`: the provider's own default, else the global one.
    pub fn model_for(&self, provider: &str) -> String {
        self.providers
            .get(provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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
            providers: HashMap::new(),
            extraction: ExtractionConfig::default(),
            matching: MatchingConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

/// The user's home directory, or the temp directory when there is none.
fn dirs_home() -> PathBuf {
    std::env::home_dir()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(std::env::temp_dir)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.extraction.min_roster_cell_chars, 5);
        assert_eq!(config.extraction.image_failure_policy, ImageFailurePolicy::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.matching.request_timeout_secs, 300);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn multi_char_delimiter_rejected() {
        let mut config = AppConfig::default();
        config.export.delimiter = ";;".into();
        assert!(config.validate().is_err());
        config.export.delimiter = ";".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_status_label_rejected() {
        let mut config = AppConfig::default();
        config.export.status_labels.absent = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.default_provider, "openrouter");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "anthropic"

[extraction]
image_failure_policy = "abort"

[export.status_labels]
present = "حاضر"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.extraction.image_failure_policy, ImageFailurePolicy::Abort);
        assert_eq!(config.extraction.min_roster_tokens, 2);
        assert_eq!(config.export.label(Status::Present), "حاضر");
        assert_eq!(config.export.label(Status::Absent), "Absent");
    }

    #[test]
    fn unparseable_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_provider = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-openai"),
            ("OPENROUTER_API_KEY", "sk-or"),
            ("ROLLCALL_MODEL", "anthropic/claude-sonnet-4"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-or"));
        assert_eq!(config.default_model, "anthropic/claude-sonnet-4");
        assert_eq!(config.default_provider, "openrouter");
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("sk-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(|_| Some("sk-env".into()));
        assert_eq!(config.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn model_for_prefers_provider_default() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "anthropic".into(),
            ProviderConfig {
                api_key: None,
                api_url: None,
                default_model: Some("claude-sonnet-4-20250514".into()),
            },
        );
        assert_eq!(config.model_for("anthropic"), "claude-sonnet-4-20250514");
        assert_eq!(config.model_for("openrouter"), "openai/gpt-4o");
    }

    #[test]
    fn debug_redacts_keys() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("image_failure_policy"));
    }
}

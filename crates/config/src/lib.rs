//! Configuration loading, validation, and management for SketchPal.
//!
//! Loads configuration from `~/.sketchpal/config.toml` with environment
//! variable overrides. The conversation engine itself never reads files or
//! the environment: the embedding application loads an [`AppConfig`] and
//! hands the relevant [`ProviderConfig`] values down.

use serde::{Deserialize, Serialize};
use sketchpal_core::capture::AnalysisPreset;
use sketchpal_core::message::ImageDetail;
use std::path::{Path, PathBuf};

/// Which backend family a provider config describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Hosted chat-completions API (OpenAI-compatible)
    #[default]
    Hosted,
    /// Self-hosted HTTP workflow endpoint
    Custom,
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" | "openai" => Ok(Self::Hosted),
            "custom" | "custom_http" => Ok(Self::Custom),
            other => Err(ConfigError::ValidationError(format!(
                "unknown provider '{other}' (expected 'hosted' or 'custom')"
            ))),
        }
    }
}

/// The root configuration structure.
///
/// Maps directly to `~/.sketchpal/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider used for chat turns
    #[serde(default)]
    pub default_provider: ProviderKind,

    /// Hosted provider settings (also used for screen analysis)
    #[serde(default = "ProviderConfig::hosted")]
    pub hosted: ProviderConfig,

    /// Custom HTTP workflow settings
    #[serde(default = "ProviderConfig::custom")]
    pub custom: ProviderConfig,

    /// Screen capture and analysis settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Seconds to wait between stream chunks before giving up
    #[serde(default = "default_stream_idle_timeout")]
    pub stream_idle_timeout_secs: u64,
}

fn default_stream_idle_timeout() -> u64 {
    60
}

/// Settings for one provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend family; fixed by the table the settings come from
    #[serde(default)]
    pub kind: ProviderKind,

    /// Base URL (hosted) or full workflow endpoint URL (custom)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stream responses token by token
    #[serde(default = "default_true")]
    pub streaming: bool,

    /// Session identifier sent to custom workflows
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// HTTP request timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4.1-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}
fn default_session_id() -> String {
    "user_1".into()
}
fn default_timeout() -> u64 {
    120
}

impl ProviderConfig {
    /// Defaults for the hosted chat-completions provider.
    pub fn hosted() -> Self {
        Self {
            kind: ProviderKind::Hosted,
            api_url: Some("https://api.openai.com/v1".into()),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            streaming: true,
            session_id: default_session_id(),
            timeout_secs: default_timeout(),
        }
    }

    /// Defaults for the custom HTTP workflow provider.
    pub fn custom() -> Self {
        Self {
            kind: ProviderKind::Custom,
            api_url: None,
            api_key: None,
            model: "workflow".into(),
            temperature: default_temperature(),
            max_tokens: None,
            streaming: false,
            session_id: default_session_id(),
            timeout_secs: default_timeout(),
        }
    }

    fn validate(&self, label: &str) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "{label}.temperature must be between 0.0 and 2.0"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{label}.timeout_secs must be > 0"
            )));
        }
        Ok(())
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("streaming", &self.streaming)
            .field("session_id", &self.session_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Detail hint for screen images
    #[serde(default = "default_image_detail")]
    pub image_detail: ImageDetail,

    /// What the vision model focuses on
    #[serde(default)]
    pub analysis_preset: AnalysisPreset,
}

fn default_image_detail() -> ImageDetail {
    ImageDetail::High
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            image_detail: default_image_detail(),
            analysis_preset: AnalysisPreset::General,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.sketchpal/config.toml).
    ///
    /// Also checks environment variables:
    /// - `SKETCHPAL_API_KEY` then `OPENAI_API_KEY` for the hosted credential
    /// - `SKETCHPAL_PROVIDER` (`hosted` or `custom`)
    /// - `SKETCHPAL_MODEL` for the hosted model
    /// - `SKETCHPAL_CUSTOM_URL` for the custom workflow endpoint
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::read_file(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.hosted.kind = ProviderKind::Hosted;
        config.custom.kind = ProviderKind::Custom;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if self.hosted.api_key.is_none() {
            self.hosted.api_key = lookup("SKETCHPAL_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("SKETCHPAL_PROVIDER") {
            self.default_provider = provider.parse()?;
        }

        if let Some(model) = lookup("SKETCHPAL_MODEL") {
            self.hosted.model = model;
        }

        if let Some(url) = lookup("SKETCHPAL_CUSTOM_URL") {
            self.custom.api_url = Some(url);
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sketchpal")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hosted.validate("hosted")?;
        self.custom.validate("custom")?;

        if self.default_provider == ProviderKind::Custom
            && self.custom.api_url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "custom.api_url is required when default_provider = \"custom\"".into(),
            ));
        }

        if self.stream_idle_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "stream_idle_timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Settings of the provider that answers chat turns.
    pub fn chat_provider(&self) -> &ProviderConfig {
        match self.default_provider {
            ProviderKind::Hosted => &self.hosted,
            ProviderKind::Custom => &self.custom,
        }
    }

    /// Settings of the provider used for screen analysis. Only the hosted
    /// family accepts images.
    pub fn vision_provider(&self) -> &ProviderConfig {
        &self.hosted
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::Hosted,
            hosted: ProviderConfig::hosted(),
            custom: ProviderConfig::custom(),
            capture: CaptureConfig::default(),
            stream_idle_timeout_secs: default_stream_idle_timeout(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, ProviderKind::Hosted);
        assert!(config.hosted.streaming);
        assert_eq!(config.custom.session_id, "user_1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.hosted.model, config.hosted.model);
        assert_eq!(parsed.capture.image_detail, ImageDetail::High);
    }

    #[test]
    fn screen_images_default_to_high_detail() {
        let config: AppConfig = toml::from_str("[capture]\nanalysis_preset = \"purpose\"\n").unwrap();
        assert_eq!(config.capture.image_detail, ImageDetail::High);

        let config: AppConfig = toml::from_str("[capture]\nimage_detail = \"auto\"\n").unwrap();
        assert_eq!(config.capture.image_detail, ImageDetail::Auto);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.hosted.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn custom_provider_requires_url() {
        let config = AppConfig {
            default_provider: ProviderKind::Custom,
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("custom.api_url"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_provider, ProviderKind::Hosted);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
default_provider = "custom"

[custom]
api_url = "http://localhost:7868/api/v1/run/flow"
session_id = "canvas-42"

[capture]
image_detail = "high"
analysis_preset = "text_content"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_provider, ProviderKind::Custom);
        assert_eq!(config.chat_provider().session_id, "canvas-42");
        assert_eq!(config.chat_provider().kind, ProviderKind::Custom);
        assert_eq!(config.capture.image_detail, ImageDetail::High);
        assert_eq!(config.capture.analysis_preset, AnalysisPreset::TextContent);
        // Hosted table absent → defaults
        assert_eq!(config.vision_provider().kind, ProviderKind::Hosted);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "default_provider = [").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-env"),
            ("SKETCHPAL_PROVIDER", "custom"),
            ("SKETCHPAL_CUSTOM_URL", "http://flow.local/run"),
            ("SKETCHPAL_MODEL", "gpt-4.1"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.hosted.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.hosted.model, "gpt-4.1");
        assert_eq!(config.default_provider, ProviderKind::Custom);
        assert_eq!(config.custom.api_url.as_deref(), Some("http://flow.local/run"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sketchpal_key_wins_over_openai_key() {
        let env: HashMap<&str, &str> =
            HashMap::from([("SKETCHPAL_API_KEY", "sk-primary"), ("OPENAI_API_KEY", "sk-other")]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.hosted.api_key.as_deref(), Some("sk-primary"));
    }

    #[test]
    fn unknown_provider_env_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|k| (k == "SKETCHPAL_PROVIDER").then(|| "bard".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = ProviderConfig::hosted();
        config.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}

//! Configuration loading, validation, and management for Coursemate.
//!
//! Loads configuration from `~/.coursemate/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Provider names the assistant knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["anthropic", "openai", "canned"];

/// Vector store backends the retrieval client knows how to build.
pub const KNOWN_BACKENDS: [&str; 3] = ["memory", "supabase", "chroma"];

/// The root configuration structure.
///
/// Maps directly to `~/.coursemate/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persona and model selection
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Provider-specific credentials and endpoints, keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Vector store and embedding settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Completion call settings
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Conversation history replay policy
    #[serde(default)]
    pub history: HistoryConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Course named in the assistant persona
    #[serde(default = "default_course_name")]
    pub course_name: String,

    /// Which provider answers questions: "anthropic", "openai", or "canned"
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per answer
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_course_name() -> String {
    "AI Education".into()
}
fn default_provider() -> String {
    "anthropic".into()
}
fn default_model() -> String {
    "claude-3-5-haiku-latest".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1000
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            course_name: default_course_name(),
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// "memory" (built-in course index), "supabase", or "chroma"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base URL of the vector store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Store API key (Supabase service key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Collection name (Chroma) or RPC function name (Supabase)
    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,

    /// Model used to embed questions before querying
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_backend() -> String {
    "memory".into()
}
fn default_collection() -> String {
    "match_course_content".into()
}
fn default_top_k() -> usize {
    4
}
fn default_retrieval_timeout() -> u64 {
    10
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            api_key: None,
            collection: default_collection(),
            top_k: default_top_k(),
            timeout_secs: default_retrieval_timeout(),
            embedding_model: default_embedding_model(),
        }
    }
}

impl std::fmt::Debug for RetrievalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalConfig")
            .field("backend", &self.backend)
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("collection", &self.collection)
            .field("top_k", &self.top_k)
            .field("timeout_secs", &self.timeout_secs)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

fn default_completion_timeout() -> u64 {
    30
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_completion_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Most recent messages replayed to the provider; older context is
    /// carried by the rolling summary.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

fn default_max_messages() -> usize {
    20
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS. Empty = any origin (the course site is static
    /// and may be served from several hosts).
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.coursemate/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from an explicit path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
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

    /// Apply environment overrides. Credentials from the environment only
    /// fill gaps; explicit selections (provider, model, host, port) replace
    /// file values.
    ///
    /// Recognized keys:
    /// - `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`
    /// - `COURSEMATE_PROVIDER`, `COURSEMATE_MODEL`
    /// - `SUPABASE_URL` + `SUPABASE_KEY` (selects the supabase backend), `CHROMA_URL`
    /// - `HOST`, `PORT`
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        for (provider, var) in [("anthropic", "ANTHROPIC_API_KEY"), ("openai", "OPENAI_API_KEY")] {
            let entry = self.providers.entry(provider.to_string()).or_default();
            if entry.api_key.is_none() {
                entry.api_key = env(var).filter(|k| !k.trim().is_empty());
            }
        }
        self.providers.retain(|_, p| p.api_key.is_some() || p.api_url.is_some());

        if let Some(provider) = env("COURSEMATE_PROVIDER") {
            self.assistant.provider = provider;
        }
        if let Some(model) = env("COURSEMATE_MODEL") {
            self.assistant.model = model;
        }

        if self.retrieval.url.is_none() {
            if let (Some(url), Some(key)) = (env("SUPABASE_URL"), env("SUPABASE_KEY")) {
                self.retrieval.backend = "supabase".into();
                self.retrieval.url = Some(url);
                self.retrieval.api_key = Some(key);
            } else if let Some(url) = env("CHROMA_URL") {
                self.retrieval.backend = "chroma".into();
                self.retrieval.url = Some(url);
                if self.retrieval.collection == default_collection() {
                    self.retrieval.collection = "course_content".into();
                }
            }
        }

        if let Some(host) = env("HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = env("PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".coursemate")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.assistant.temperature) {
            return Err(ConfigError::ValidationError(
                "assistant.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !KNOWN_PROVIDERS.contains(&self.assistant.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "assistant.provider must be one of {KNOWN_PROVIDERS:?}, got '{}'",
                self.assistant.provider
            )));
        }

        if !KNOWN_BACKENDS.contains(&self.retrieval.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.backend must be one of {KNOWN_BACKENDS:?}, got '{}'",
                self.retrieval.backend
            )));
        }

        if self.retrieval.backend != "memory" && self.retrieval.url.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.url is required for the '{}' backend",
                self.retrieval.backend
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        if self.retrieval.timeout_secs == 0 || self.completion.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than 0".into(),
            ));
        }

        if self.history.max_messages < 2 {
            return Err(ConfigError::ValidationError(
                "history.max_messages must be at least 2".into(),
            ));
        }

        Ok(())
    }

    /// The API key for a named provider, if any.
    pub fn provider_api_key(&self, name: &str) -> Option<&str> {
        self.providers.get(name).and_then(|p| p.api_key.as_deref())
    }

    /// The API URL override for a named provider, if any.
    pub fn provider_api_url(&self, name: &str) -> Option<&str> {
        self.providers.get(name).and_then(|p| p.api_url.as_deref())
    }

    /// Check if the selected provider has a credential.
    pub fn has_api_key(&self) -> bool {
        self.provider_api_key(&self.assistant.provider).is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.assistant.provider, "anthropic");
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.history.max_messages, 20);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.assistant.model, config.assistant.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.assistant.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn remote_backend_requires_url() {
        let mut config = AppConfig::default();
        config.retrieval.backend = "supabase".into();
        assert!(config.validate().is_err());
        config.retrieval.url = Some("https://x.supabase.co".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = AppConfig::default();
        config.assistant.provider = "mystery".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.assistant.course_name, "AI Education");
    }

    #[test]
    fn loads_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[assistant]
course_name = "Intro to ML"

[retrieval]
backend = "chroma"
url = "http://localhost:8000"
collection = "course_content"

[providers.anthropic]
api_key = "sk-ant-test"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.assistant.course_name, "Intro to ML");
        assert_eq!(config.assistant.model, "claude-3-5-haiku-latest");
        assert_eq!(config.retrieval.backend, "chroma");
        assert_eq!(config.provider_api_key("anthropic"), Some("sk-ant-test"));
        assert!(config.has_api_key());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[assistant\nmodel = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_fills_missing_credentials_only() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "anthropic".into(),
            ProviderConfig {
                api_key: Some("from-file".into()),
                api_url: None,
            },
        );
        config.apply_env_overrides(env_from(&[
            ("ANTHROPIC_API_KEY", "from-env"),
            ("OPENAI_API_KEY", "sk-openai"),
        ]));
        assert_eq!(config.provider_api_key("anthropic"), Some("from-file"));
        assert_eq!(config.provider_api_key("openai"), Some("sk-openai"));
    }

    #[test]
    fn env_without_keys_leaves_no_empty_providers() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env_from(&[("ANTHROPIC_API_KEY", "  ")]));
        assert!(config.providers.is_empty());
        assert!(!config.has_api_key());
    }

    #[test]
    fn supabase_env_selects_backend() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env_from(&[
            ("SUPABASE_URL", "https://proj.supabase.co"),
            ("SUPABASE_KEY", "service-key"),
            ("PORT", "8080"),
        ]));
        assert_eq!(config.retrieval.backend, "supabase");
        assert_eq!(config.retrieval.url.as_deref(), Some("https://proj.supabase.co"));
        assert_eq!(config.gateway.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.retrieval.api_key = Some("super-secret".into());
        config.providers.insert(
            "anthropic".into(),
            ProviderConfig {
                api_key: Some("sk-ant-secret".into()),
                api_url: None,
            },
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("claude-3-5-haiku-latest"));
        assert!(toml_str.contains("3000"));
    }
}

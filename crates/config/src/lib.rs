//! Configuration loading, validation, and management for deepsift.
//!
//! Loads defaults from `~/.deepsift/config.toml` with environment variable
//! overrides. The research engine never reads this file: the CLI turns it,
//! together with command-line flags, into an explicit per-request
//! [`ProviderConfig`] and [`ResearchBudget`].

pub mod effort;
pub mod provider;

pub use effort::{EffortTier, ResearchBudget};
pub use provider::{
    LlmProviderConfig, LlmProviderKind, ModelSelection, ProviderConfig, SearchBackend,
    SearchProviderConfig, SearchProviderKind,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.deepsift/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default LLM backend
    #[serde(default = "default_llm_provider")]
    pub llm_provider: LlmProviderKind,

    /// Default search backend
    #[serde(default = "default_search_provider")]
    pub search_provider: SearchProviderKind,

    /// Model name applied to every step, whatever the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Research breadth/depth defaults
    #[serde(default)]
    pub research: ResearchSection,

    /// Search call limits
    #[serde(default)]
    pub search: SearchSection,

    #[serde(default)]
    pub google: GoogleSection,

    #[serde(default)]
    pub openai: OpenAiSection,

    #[serde(default)]
    pub custom: CustomSection,

    #[serde(default)]
    pub brave: BraveSection,

    #[serde(default)]
    pub searxng: SearxngSection,
}

fn default_llm_provider() -> LlmProviderKind {
    LlmProviderKind::Google
}
fn default_search_provider() -> SearchProviderKind {
    SearchProviderKind::Google
}

impl Default for LlmProviderKind {
    fn default() -> Self {
        default_llm_provider()
    }
}

impl Default for SearchProviderKind {
    fn default() -> Self {
        default_search_provider()
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchSection {
    #[serde(default)]
    pub effort: EffortTier,

    /// Overrides the tier's initial query count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_queries: Option<u32>,

    /// Overrides the tier's loop limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_loops: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_timeout_secs() -> u64 {
    provider::DEFAULT_SEARCH_TIMEOUT_SECS
}
fn default_max_results() -> usize {
    provider::DEFAULT_MAX_RESULTS
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GoogleSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_query_model")]
    pub query_model: String,

    #[serde(default = "default_reflection_model")]
    pub reflection_model: String,

    #[serde(default = "default_answer_model")]
    pub answer_model: String,

    /// Model used for grounded web search
    #[serde(default = "default_search_model")]
    pub search_model: String,
}

fn default_query_model() -> String {
    provider::GEMINI_QUERY_MODEL.into()
}
fn default_reflection_model() -> String {
    provider::GEMINI_REFLECTION_MODEL.into()
}
fn default_answer_model() -> String {
    provider::GEMINI_ANSWER_MODEL.into()
}
fn default_search_model() -> String {
    provider::GEMINI_SEARCH_MODEL.into()
}

impl Default for GoogleSection {
    fn default() -> Self {
        Self {
            api_key: None,
            query_model: default_query_model(),
            reflection_model: default_reflection_model(),
            answer_model: default_answer_model(),
            search_model: default_search_model(),
        }
    }
}

impl std::fmt::Debug for GoogleSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSection")
            .field("api_key", &redact(&self.api_key))
            .field("query_model", &self.query_model)
            .field("reflection_model", &self.reflection_model)
            .field("answer_model", &self.answer_model)
            .field("search_model", &self.search_model)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct OpenAiSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl std::fmt::Debug for OpenAiSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSection")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CustomSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl std::fmt::Debug for CustomSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomSection")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct BraveSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for BraveSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BraveSection")
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearxngSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Per-invocation choices that take precedence over the loaded config.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub llm_provider: Option<LlmProviderKind>,
    pub search_provider: Option<SearchProviderKind>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.deepsift/config.toml).
    ///
    /// Environment variables override file values:
    /// - `GEMINI_API_KEY`, `OPENAI_API_KEY`, `BRAVE_API_KEY`
    /// - `SEARXNG_BASE_URL`
    /// - `DEEPSIFT_LLM_PROVIDER`, `DEEPSIFT_SEARCH_PROVIDER`, `DEEPSIFT_MODEL`
    /// - `NUMBER_OF_INITIAL_QUERIES`, `MAX_RESEARCH_LOOPS`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
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

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY") {
            self.google.api_key = Some(key);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(key) = get("BRAVE_API_KEY") {
            self.brave.api_key = Some(key);
        }
        if let Some(url) = get("SEARXNG_BASE_URL") {
            self.searxng.base_url = Some(url);
        }
        if let Some(kind) = get("DEEPSIFT_LLM_PROVIDER") {
            self.llm_provider = kind.parse().map_err(ConfigError::ValidationError)?;
        }
        if let Some(kind) = get("DEEPSIFT_SEARCH_PROVIDER") {
            self.search_provider = kind.parse().map_err(ConfigError::ValidationError)?;
        }
        if let Some(model) = get("DEEPSIFT_MODEL") {
            self.model = Some(model);
        }
        if let Some(n) = get("NUMBER_OF_INITIAL_QUERIES") {
            self.research.initial_queries = Some(parse_count("NUMBER_OF_INITIAL_QUERIES", &n)?);
        }
        if let Some(n) = get("MAX_RESEARCH_LOOPS") {
            self.research.max_loops = Some(parse_count("MAX_RESEARCH_LOOPS", &n)?);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deepsift")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    ///
    /// Only checks what is wrong regardless of provider choice; missing
    /// credentials are reported when a request selects that provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "search.timeout_secs must be > 0".into(),
            ));
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_results must be > 0".into(),
            ));
        }
        if matches!(&self.model, Some(m) if m.trim().is_empty()) {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }
        Ok(())
    }

    /// The research budget these defaults describe.
    pub fn budget(&self) -> ResearchBudget {
        ResearchBudget::resolve(
            self.research.effort,
            self.research.initial_queries,
            self.research.max_loops,
        )
    }

    /// Build the per-request provider configuration.
    pub fn provider_config(&self, overrides: &Overrides) -> Result<ProviderConfig, ConfigError> {
        let config = ProviderConfig::new(
            self.search_config(overrides.search_provider.unwrap_or(self.search_provider)),
            self.llm_config(overrides)?,
        );
        config.validate()?;
        Ok(config)
    }

    fn search_config(&self, kind: SearchProviderKind) -> SearchProviderConfig {
        let backend = match kind {
            SearchProviderKind::Google => SearchBackend::Google {
                api_key: self.google.api_key.clone().unwrap_or_default(),
                model: self.google.search_model.clone(),
            },
            SearchProviderKind::Brave => SearchBackend::Brave {
                api_key: self.brave.api_key.clone().unwrap_or_default(),
            },
            SearchProviderKind::Searxng => SearchBackend::Searxng {
                base_url: self.searxng.base_url.clone().unwrap_or_default(),
            },
        };
        SearchProviderConfig {
            backend,
            timeout_secs: self.search.timeout_secs,
            max_results: self.search.max_results,
        }
    }

    fn llm_config(&self, overrides: &Overrides) -> Result<LlmProviderConfig, ConfigError> {
        let kind = overrides.llm_provider.unwrap_or(self.llm_provider);
        let model = overrides.model.clone().or_else(|| self.model.clone());

        let llm = match kind {
            LlmProviderKind::Google => {
                if overrides.base_url.is_some() {
                    return Err(ConfigError::Provider(
                        "google: a base URL can only be set for openai or custom".into(),
                    ));
                }
                LlmProviderConfig::Google {
                    api_key: self.google.api_key.clone().unwrap_or_default(),
                    models: match model {
                        Some(m) => ModelSelection::uniform(m),
                        None => ModelSelection {
                            query_model: self.google.query_model.clone(),
                            reflection_model: self.google.reflection_model.clone(),
                            answer_model: self.google.answer_model.clone(),
                        },
                    },
                }
            }
            LlmProviderKind::OpenAi => LlmProviderConfig::OpenAi {
                api_key: self.openai.api_key.clone().unwrap_or_default(),
                base_url: overrides.base_url.clone().or_else(|| self.openai.base_url.clone()),
                models: ModelSelection::uniform(
                    model.or_else(|| self.openai.model.clone()).unwrap_or_default(),
                ),
            },
            LlmProviderKind::Custom => LlmProviderConfig::Custom {
                base_url: overrides
                    .base_url
                    .clone()
                    .or_else(|| self.custom.base_url.clone())
                    .unwrap_or_default(),
                api_key: self.custom.api_key.clone(),
                models: ModelSelection::uniform(
                    model.or_else(|| self.custom.model.clone()).unwrap_or_default(),
                ),
            },
        };
        Ok(llm)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_count(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key} must be a non-negative integer, got '{value}'"))
    })
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

    #[error("Provider configuration error: {0}")]
    Provider(String),
}

impl From<ConfigError> for deepsift_core::Error {
    fn from(err: ConfigError) -> Self {
        deepsift_core::Error::Config {
            message: err.to_string(),
        }
    }
}

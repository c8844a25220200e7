//! Per-request provider configuration.
//!
//! A [`ProviderConfig`] is built once when a request starts and is read-only
//! afterwards. It is threaded explicitly into the backend factories; there is
//! no process-wide provider selection.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ConfigError;

pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RESULTS: usize = 8;

pub const GEMINI_QUERY_MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_REFLECTION_MODEL: &str = "gemini-2.5-flash";
pub const GEMINI_ANSWER_MODEL: &str = "gemini-2.5-pro";
pub const GEMINI_SEARCH_MODEL: &str = "gemini-2.0-flash";

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn redact(s: &str) -> &'static str {
    if s.is_empty() { "<empty>" } else { "[REDACTED]" }
}

fn redact_opt(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

/// Which model serves each generation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub query_model: String,
    pub reflection_model: String,
    pub answer_model: String,
}

impl ModelSelection {
    /// One model for every step.
    pub fn uniform(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            query_model: model.clone(),
            reflection_model: model.clone(),
            answer_model: model,
        }
    }

    /// The declared defaults for the vendor-hosted Gemini backend.
    pub fn gemini_defaults() -> Self {
        Self {
            query_model: GEMINI_QUERY_MODEL.into(),
            reflection_model: GEMINI_REFLECTION_MODEL.into(),
            answer_model: GEMINI_ANSWER_MODEL.into(),
        }
    }

    fn validate(&self, provider: &str) -> Result<(), ConfigError> {
        for (step, name) in [
            ("query", &self.query_model),
            ("reflection", &self.reflection_model),
            ("answer", &self.answer_model),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::Provider(format!(
                    "{provider}: {step} model name is empty"
                )));
            }
        }
        Ok(())
    }
}

/// Search backend kinds, for selection by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    Google,
    Brave,
    Searxng,
}

impl SearchProviderKind {
    pub const ALL: [Self; 3] = [Self::Google, Self::Brave, Self::Searxng];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Brave => "brave",
            Self::Searxng => "searxng",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Google => "Gemini with Google Search grounding (needs GEMINI_API_KEY)",
            Self::Brave => "Brave Search API (needs BRAVE_API_KEY)",
            Self::Searxng => "self-hosted SearXNG instance (needs SEARXNG_BASE_URL)",
        }
    }
}

impl FromStr for SearchProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(Self::Google),
            "brave" => Ok(Self::Brave),
            "searxng" => Ok(Self::Searxng),
            other => Err(format!(
                "unknown search provider '{other}' (expected google, brave or searxng)"
            )),
        }
    }
}

impl std::fmt::Display for SearchProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language-model backend kinds, for selection by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    Google,
    OpenAi,
    Custom,
}

impl LlmProviderKind {
    pub const ALL: [Self; 3] = [Self::Google, Self::OpenAi, Self::Custom];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::OpenAi => "openai",
            Self::Custom => "custom",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Google => "Gemini API (needs GEMINI_API_KEY)",
            Self::OpenAi => "OpenAI chat completions (needs OPENAI_API_KEY and a model)",
            Self::Custom => "any OpenAI-compatible endpoint (needs a base URL and a model)",
        }
    }
}

impl FromStr for LlmProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            "custom" => Ok(Self::Custom),
            other => Err(format!(
                "unknown LLM provider '{other}' (expected google, openai or custom)"
            )),
        }
    }
}

impl std::fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The selected search backend and its credentials or endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum SearchBackend {
    /// General web search through a grounded Gemini call
    Google { api_key: String, model: String },
    /// Keyed search API
    Brave { api_key: String },
    /// Self-hosted metasearch
    Searxng { base_url: String },
}

impl std::fmt::Debug for SearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Google { api_key, model } => f
                .debug_struct("Google")
                .field("api_key", &redact(api_key))
                .field("model", model)
                .finish(),
            Self::Brave { api_key } => f
                .debug_struct("Brave")
                .field("api_key", &redact(api_key))
                .finish(),
            Self::Searxng { base_url } => f
                .debug_struct("Searxng")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchProviderConfig {
    #[serde(flatten)]
    pub backend: SearchBackend,

    /// Per-call timeout for the Brave and SearXNG APIs
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Hits kept per query
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_search_timeout() -> u64 {
    DEFAULT_SEARCH_TIMEOUT_SECS
}
fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl SearchProviderConfig {
    pub fn new(backend: SearchBackend) -> Self {
        Self {
            backend,
            timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn kind(&self) -> SearchProviderKind {
        match self.backend {
            SearchBackend::Google { .. } => SearchProviderKind::Google,
            SearchBackend::Brave { .. } => SearchProviderKind::Brave,
            SearchBackend::Searxng { .. } => SearchProviderKind::Searxng,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.backend {
            SearchBackend::Google { api_key, model } => {
                require("google search", "api_key", api_key)?;
                require("google search", "model", model)?;
            }
            SearchBackend::Brave { api_key } => require("brave", "api_key", api_key)?,
            SearchBackend::Searxng { base_url } => {
                require("searxng", "base_url", base_url)?;
                require_url("searxng", base_url)?;
            }
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Provider("search timeout must be > 0".into()));
        }
        if self.max_results == 0 {
            return Err(ConfigError::Provider("search max_results must be > 0".into()));
        }
        Ok(())
    }
}

/// The selected language-model backend, its credentials, and models.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmProviderConfig {
    /// Vendor-hosted Gemini
    Google {
        api_key: String,
        models: ModelSelection,
    },
    /// OpenAI itself (base URL overridable for proxies)
    OpenAi {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
        models: ModelSelection,
    },
    /// Any OpenAI-compatible endpoint
    Custom {
        base_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        models: ModelSelection,
    },
}

impl std::fmt::Debug for LlmProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Google { api_key, models } => f
                .debug_struct("Google")
                .field("api_key", &redact(api_key))
                .field("models", models)
                .finish(),
            Self::OpenAi {
                api_key,
                base_url,
                models,
            } => f
                .debug_struct("OpenAi")
                .field("api_key", &redact(api_key))
                .field("base_url", base_url)
                .field("models", models)
                .finish(),
            Self::Custom {
                base_url,
                api_key,
                models,
            } => f
                .debug_struct("Custom")
                .field("base_url", base_url)
                .field("api_key", &redact_opt(api_key))
                .field("models", models)
                .finish(),
        }
    }
}

impl LlmProviderConfig {
    pub fn kind(&self) -> LlmProviderKind {
        match self {
            Self::Google { .. } => LlmProviderKind::Google,
            Self::OpenAi { .. } => LlmProviderKind::OpenAi,
            Self::Custom { .. } => LlmProviderKind::Custom,
        }
    }

    pub fn models(&self) -> &ModelSelection {
        match self {
            Self::Google { models, .. }
            | Self::OpenAi { models, .. }
            | Self::Custom { models, .. } => models,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Google { api_key, models } => {
                require("google", "api_key", api_key)?;
                models.validate("google")
            }
            Self::OpenAi {
                api_key,
                base_url,
                models,
            } => {
                require("openai", "api_key", api_key)?;
                if let Some(url) = base_url {
                    require_url("openai", url)?;
                }
                models.validate("openai")
            }
            Self::Custom {
                base_url, models, ..
            } => {
                require("custom", "base_url", base_url)?;
                require_url("custom", base_url)?;
                models.validate("custom")
            }
        }
    }
}

/// Everything a request needs to reach its backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub search: SearchProviderConfig,
    pub llm: LlmProviderConfig,
}

impl ProviderConfig {
    pub fn new(search: SearchProviderConfig, llm: LlmProviderConfig) -> Self {
        Self { search, llm }
    }

    /// Check every required field for the selected backends.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()?;
        self.llm.validate()
    }
}

fn require(provider: &str, field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Provider(format!("{provider}: {field} is required")))
    } else {
        Ok(())
    }
}

fn require_url(provider: &str, value: &str) -> Result<(), ConfigError> {
    match url::Url::parse(value) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(()),
        Ok(u) => Err(ConfigError::Provider(format!(
            "{provider}: unsupported URL scheme '{}'",
            u.scheme()
        ))),
        Err(e) => Err(ConfigError::Provider(format!(
            "{provider}: invalid URL '{value}': {e}"
        ))),
    }
}

//! Error types for the deepsift domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Capability calls fail with [`ProviderError`]; a research request fails
//! with [`Error`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for a research request.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Generation (query generation, reflection, finalization) ---
    #[error("Generation failed during {stage}: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: ProviderError,
    },

    // --- Fan-out ---
    #[error("Research iteration {iteration} failed: all {} search tasks failed", failures.len())]
    ResearchIterationFailed {
        iteration: u32,
        failures: Vec<TaskFailure>,
    },

    // --- Caller ---
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Wrap a capability failure raised while producing `stage`'s output.
    pub fn generation(stage: Stage, source: ProviderError) -> Self {
        Self::Generation { stage, source }
    }

    /// Short machine-readable name for the terminal failure signal.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "provider_config_error",
            Self::Generation { .. } => "generation_error",
            Self::ResearchIterationFailed { .. } => "research_iteration_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// The generation step an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    QueryGeneration,
    Reflection,
    Finalization,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::QueryGeneration => "query generation",
            Self::Reflection => "reflection",
            Self::Finalization => "finalization",
        };
        f.write_str(name)
    }
}

/// One search-and-summarize task that failed inside a fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    pub query: String,
    pub error: String,
}

// --- Bounded context errors ---

/// Failure of a single Search Provider or Language Model call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status_code: u16, body: impl Into<String>) -> Self {
        match status_code {
            401 | 403 => Self::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ),
            429 => Self::RateLimited { retry_after_secs: 5 },
            _ => Self::ApiError {
                status_code,
                message: body.into(),
            },
        }
    }

    /// Connectivity-class failures that deserve one more attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedOutput(_))
    }

    /// Whether the shared retry policy allows a second attempt.
    pub fn is_retryable(&self) -> bool {
        self.is_transient() || self.is_malformed()
    }
}

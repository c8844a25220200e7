//! Search capability: the abstraction over web search backends.
//!
//! Implementations: grounded Gemini search, Brave, SearXNG.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A single ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

impl SearchHit {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }

    /// Label shown for this hit, falling back to the URL when untitled.
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// A human-readable name for this backend (e.g., "brave").
    fn name(&self) -> &str;

    /// Run `query` and return hits in rank order.
    async fn search(&self, query: &str) -> std::result::Result<Vec<SearchHit>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_url() {
        let hit = SearchHit::new("https://example.com", "  ", "");
        assert_eq!(hit.label(), "https://example.com");

        let titled = SearchHit::new("https://example.com", "Example", "");
        assert_eq!(titled.label(), "Example");
    }

    #[test]
    fn snippet_defaults_when_missing() {
        let hit: SearchHit =
            serde_json::from_str(r#"{"url":"https://a.dev","title":"A"}"#).unwrap();
        assert!(hit.snippet.is_empty());
    }
}

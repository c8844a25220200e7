//! Brave Search API backend.

use async_trait::async_trait;
use deepsift_core::{ProviderError, SearchHit, SearchProvider};
use deepsift_providers::http::{build_client, check_status, transport_error};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

pub struct BraveSearch {
    api_key: String,
    max_results: usize,
    client: reqwest::Client,
}

impl BraveSearch {
    pub fn new(
        api_key: impl Into<String>,
        timeout: Duration,
        max_results: usize,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured("BRAVE_API_KEY is not set".into()));
        }
        Ok(Self {
            api_key,
            max_results,
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        debug!(provider = "brave", query, "Searching");

        let count = self.max_results.min(20).to_string();
        let response = self
            .client
            .get(BRAVE_ENDPOINT)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status("brave", response).await?;
        let parsed: BraveResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse Brave response: {e}"),
        })?;

        Ok(parsed.into_hits(self.max_results))
    }
}

// --- Brave API types ---

#[derive(Debug, Default, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Default, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

impl BraveResponse {
    fn into_hits(self, max: usize) -> Vec<SearchHit> {
        self.web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.url.trim().is_empty())
            .take(max)
            .map(|r| SearchHit::new(r.url, r.title, r.description))
            .collect()
    }
}

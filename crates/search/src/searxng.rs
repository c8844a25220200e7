//! Self-hosted SearXNG backend (JSON output format must be enabled).

use async_trait::async_trait;
use deepsift_core::{ProviderError, SearchHit, SearchProvider};
use deepsift_providers::http::{build_client, check_status, transport_error};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub struct SearxngSearch {
    endpoint: String,
    max_results: usize,
    client: reqwest::Client,
}

impl SearxngSearch {
    pub fn new(
        base_url: impl AsRef<str>,
        timeout: Duration,
        max_results: usize,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.as_ref();
        if base_url.trim().is_empty() {
            return Err(ProviderError::NotConfigured("SEARXNG_BASE_URL is not set".into()));
        }
        Ok(Self {
            endpoint: search_endpoint(base_url),
            max_results,
            client: build_client(timeout)?,
        })
    }
}

/// Accept either an instance base URL or its full `/search` endpoint.
fn search_endpoint(base_url: &str) -> String {
    let mut base = base_url.trim().trim_end_matches('/').to_string();
    if !base.ends_with("/search") {
        base.push_str("/search");
    }
    base
}

#[async_trait]
impl SearchProvider for SearxngSearch {
    fn name(&self) -> &str {
        "searxng"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        debug!(provider = "searxng", query, "Searching");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status("searxng", response).await?;
        let parsed: SearxngResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse SearXNG response (is the json format enabled?): {e}"),
        })?;

        Ok(parsed.into_hits(self.max_results))
    }
}

// --- SearXNG API types ---

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    // SearXNG uses `content` for snippets
    #[serde(default)]
    content: String,
}

impl SearxngResponse {
    fn into_hits(self, max: usize) -> Vec<SearchHit> {
        self.results
            .into_iter()
            .filter(|r| !r.url.trim().is_empty())
            .take(max)
            .map(|r| SearchHit::new(r.url, r.title, r.content))
            .collect()
    }
}

//! General web search through a Gemini call grounded with Google Search.
//!
//! The model is asked to research the query with the `google_search` tool.
//! Hits are read from the grounding metadata: one hit per grounding chunk,
//! with the supported answer segments as its snippet.

use async_trait::async_trait;
use deepsift_core::{ProviderError, SearchHit, SearchProvider};
use deepsift_providers::gemini::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Tool,
};
use deepsift_providers::http::truncate;
use deepsift_providers::GeminiClient;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

const SNIPPET_CHARS: usize = 400;

pub struct GoogleGroundedSearch {
    client: GeminiClient,
    model: String,
    max_results: usize,
}

impl GoogleGroundedSearch {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        max_results: usize,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: GeminiClient::new(api_key, timeout)?,
            model: model.into(),
            max_results,
        })
    }

    fn build_request(query: &str) -> GenerateContentRequest {
        let prompt = format!(
            "Conduct targeted Google searches to gather the most recent, credible \
             information on \"{query}\" and synthesize it into a short, factual text \
             report. Only include information found in the search results."
        );
        GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
            tools: vec![Tool::google_search()],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.0),
                response_mime_type: None,
            }),
        }
    }
}

/// Turn grounding chunks into ranked, URL-distinct hits.
fn hits_from_grounding(response: &GenerateContentResponse, max: usize) -> Vec<SearchHit> {
    let Some(grounding) = response.grounding() else {
        return Vec::new();
    };
    let report = response.text().unwrap_or_default();

    let mut seen = HashSet::new();
    let mut hits = Vec::new();
    for (idx, chunk) in grounding.grounding_chunks.iter().enumerate() {
        let Some(web) = &chunk.web else { continue };
        if web.uri.trim().is_empty() || !seen.insert(web.uri.as_str()) {
            continue;
        }

        let segments: Vec<&str> = grounding
            .grounding_supports
            .iter()
            .filter(|s| s.grounding_chunk_indices.contains(&idx))
            .map(|s| s.segment.text.trim())
            .filter(|t| !t.is_empty())
            .collect();
        let snippet = if segments.is_empty() {
            truncate(report.trim(), SNIPPET_CHARS).to_string()
        } else {
            truncate(&segments.join(" "), SNIPPET_CHARS).to_string()
        };

        hits.push(SearchHit::new(web.uri.clone(), web.title.clone(), snippet));
        if hits.len() >= max {
            break;
        }
    }
    hits
}

#[async_trait]
impl SearchProvider for GoogleGroundedSearch {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        debug!(provider = "google", model = %self.model, query, "Searching");
        let response = self
            .client
            .generate_content(&self.model, &Self::build_request(query))
            .await?;
        Ok(hits_from_grounding(&response, self.max_results))
    }
}

//! Gemini (Generative Language API) backend.
//!
//! `GeminiClient` speaks `models/{model}:generateContent` and is shared with
//! the grounded search backend. `GeminiModel` wraps it as a
//! [`LanguageModel`] that requests JSON output.

use async_trait::async_trait;
use deepsift_core::{LanguageModel, ProviderError, StructuredRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::http::{build_client, check_status, transport_error};
use crate::structured::{parse_json_payload, render_prompt};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Timeout for a full generation call, grounded or not.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// Low-level `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured("GEMINI_API_KEY is not set".into()));
        }
        Ok(Self {
            base_url: GEMINI_BASE_URL.into(),
            api_key,
            http: build_client(timeout)?,
        })
    }

    /// Point at a proxy or test server instead of the public endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        debug!(provider = "gemini", model, "Sending generateContent request");

        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status("gemini", response).await?;

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })
    }
}

/// A Gemini model producing structured JSON.
pub struct GeminiModel {
    client: GeminiClient,
}

impl GeminiModel {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: GeminiClient::new(api_key, LLM_TIMEOUT)?,
        })
    }

    pub fn from_client(client: GeminiClient) -> Self {
        Self { client }
    }

    fn build_request(request: &StructuredRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user_text(render_prompt(request))],
            tools: Vec::new(),
            generation_config: Some(GenerationConfig {
                temperature: Some(request.temperature),
                response_mime_type: Some("application/json".into()),
            }),
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_structured(
        &self,
        request: StructuredRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let body = Self::build_request(&request);
        let response = self.client.generate_content(&request.model, &body).await?;
        let text = response.text().ok_or_else(|| {
            ProviderError::MalformedOutput(format!(
                "no text in response{}",
                response
                    .finish_reason()
                    .map(|r| format!(" (finish reason {r})"))
                    .unwrap_or_default()
            ))
        })?;
        parse_json_payload(&text)
    }
}

// --- Gemini API types ---

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".into()),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A tool enabled for the call. Only Google Search grounding is used.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: serde_json::Value,
}

impl Tool {
    pub fn google_search() -> Self {
        Self {
            google_search: serde_json::json!({}),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.iter().all(|t| t.trim().is_empty()) {
            None
        } else {
            Some(text.join(""))
        }
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }

    pub fn grounding(&self) -> Option<&GroundingMetadata> {
        self.candidates.first()?.grounding_metadata.as_ref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    pub grounding_supports: Vec<GroundingSupport>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebChunk {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSupport {
    #[serde(default)]
    pub segment: Segment,
    #[serde(default)]
    pub grounding_chunk_indices: Vec<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub text: String,
}

//! OpenAI-compatible backend.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, llama.cpp, LM Studio, and
//! any endpoint that serves `/chat/completions`.
//!
//! Structured output is requested with `response_format: json_object` and
//! the schema is spelled out in a system message.

use async_trait::async_trait;
use deepsift_core::{LanguageModel, ProviderError, StructuredRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::http::{build_client, check_status, transport_error};
use crate::structured::{parse_json_payload, schema_instruction};

const LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// An OpenAI-compatible language model endpoint.
pub struct OpenAiCompatModel {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(ProviderError::NotConfigured("base URL is required".into()));
        }
        Ok(Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: build_client(LLM_TIMEOUT)?,
        })
    }

    /// OpenAI itself (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured("OPENAI_API_KEY is not set".into()));
        }
        Self::new("openai", deepsift_config::provider::OPENAI_BASE_URL, Some(api_key))
    }

    fn build_body(request: &StructuredRequest) -> ChatRequest<'_> {
        ChatRequest {
            model: &request.model,
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: schema_instruction(request),
                },
                ApiMessage {
                    role: "user",
                    content: request.prompt.clone(),
                },
            ],
            temperature: request.temperature,
            response_format: ResponseFormat {
                r#type: "json_object",
            },
            stream: false,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_structured(
        &self,
        request: StructuredRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(transport_error)?;
        let response = check_status(&self.name, response).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let content = api_response.first_content().ok_or_else(|| {
            ProviderError::MalformedOutput("No message content in response".into())
        })?;
        parse_json_payload(content)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    temperature: f32,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

impl ApiResponse {
    fn first_content(&self) -> Option<&str> {
        self.choices
            .first()?
            .message
            .content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StructuredRequest {
        StructuredRequest {
            model: "gpt-4o-mini".into(),
            prompt: "Write the answer.".into(),
            schema_name: "SynthesizedAnswer".into(),
            schema: serde_json::json!({"type": "object", "properties": {"answer": {"type": "string"}}}),
            temperature: 0.0,
        }
    }

    #[test]
    fn openai_constructor() {
        let model = OpenAiCompatModel::openai("sk-test").unwrap();
        assert_eq!(model.name(), "openai");
        assert!(model.base_url.contains("api.openai.com"));
    }

    #[test]
    fn openai_requires_key() {
        assert!(matches!(
            OpenAiCompatModel::openai(" "),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn custom_endpoint_trims_slash_and_blank_key() {
        let model =
            OpenAiCompatModel::new("custom", "http://localhost:11434/v1/", Some(String::new()))
                .unwrap();
        assert_eq!(model.base_url, "http://localhost:11434/v1");
        assert!(model.api_key.is_none());
    }

    #[test]
    fn body_requests_json_object() {
        let req = request();
        let body = serde_json::to_value(OpenAiCompatModel::build_body(&req)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Write the answer.");
        assert_eq!(body["stream"], false);
        assert!(body["messages"][0]["content"].as_str().unwrap().contains("SynthesizedAnswer"));
    }

    #[test]
    fn parse_chat_response() {
        let data = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"answer\": \"ok\"}"}}]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let value = parse_json_payload(parsed.first_content().unwrap()).unwrap();
        assert_eq!(value["answer"], "ok");
    }

    #[test]
    fn missing_content_is_none() {
        let data = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.first_content().is_none());
    }
}

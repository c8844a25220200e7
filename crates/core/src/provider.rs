//! Language-model capability: the abstraction over structured-output backends.
//!
//! A `LanguageModel` takes a prompt plus a JSON Schema describing the object
//! it must produce, and returns that object. The research loop never sees
//! vendor wire formats.
//!
//! Implementations: Gemini (vendor-hosted), OpenAI-compatible endpoints.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// One structured-generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredRequest {
    /// The model to use (e.g., "gemini-2.5-flash", "gpt-4o")
    pub model: String,

    /// The full prompt text
    pub prompt: String,

    /// Name of the output shape, used by backends that label schemas
    pub schema_name: String,

    /// JSON Schema the output must satisfy
    pub schema: serde_json::Value,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    1.0
}

impl StructuredRequest {
    /// Build a request whose schema is derived from `T`.
    pub fn for_type<T: JsonSchema>(
        model: impl Into<String>,
        prompt: impl Into<String>,
        temperature: f32,
    ) -> Self {
        let schema = schemars::schema_for!(T);
        Self {
            model: model.into(),
            prompt: prompt.into(),
            schema_name: T::schema_name().into_owned(),
            schema: serde_json::to_value(&schema).unwrap_or(serde_json::Value::Null),
            temperature,
        }
    }
}

/// The core LanguageModel trait.
///
/// Every LLM backend implements this trait. The research loop calls
/// `generate_structured()` without knowing which vendor is answering.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name for this backend (e.g., "gemini", "openai").
    fn name(&self) -> &str;

    /// Generate an object matching `request.schema`.
    async fn generate_structured(
        &self,
        request: StructuredRequest,
    ) -> std::result::Result<serde_json::Value, ProviderError>;
}

/// Generate and deserialize a `T` in one call.
///
/// A response that does not fit `T` is reported as
/// [`ProviderError::MalformedOutput`].
pub async fn generate<T>(
    model: &dyn LanguageModel,
    model_name: &str,
    prompt: impl Into<String>,
    temperature: f32,
) -> std::result::Result<T, ProviderError>
where
    T: DeserializeOwned + JsonSchema,
{
    let request = StructuredRequest::for_type::<T>(model_name, prompt, temperature);
    let schema_name = request.schema_name.clone();
    let value = model.generate_structured(request).await?;
    serde_json::from_value(value).map_err(|e| {
        ProviderError::MalformedOutput(format!("response does not match {schema_name}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Echo {
        text: String,
    }

    struct FixedModel(serde_json::Value);

    #[async_trait]
    impl LanguageModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate_structured(
            &self,
            _request: StructuredRequest,
        ) -> std::result::Result<serde_json::Value, ProviderError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn request_carries_derived_schema() {
        let req = StructuredRequest::for_type::<Echo>("m", "p", 0.0);
        assert_eq!(req.schema_name, "Echo");
        assert!(req.schema["properties"]["text"].is_object());
        assert!(req.temperature.abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn typed_generate_parses() {
        let model = FixedModel(serde_json::json!({"text": "hello"}));
        let echo: Echo = generate(&model, "m", "say hello", 1.0).await.unwrap();
        assert_eq!(echo.text, "hello");
    }

    #[tokio::test]
    async fn shape_mismatch_is_malformed() {
        let model = FixedModel(serde_json::json!({"other": 1}));
        let err = generate::<Echo>(&model, "m", "p", 1.0).await.unwrap_err();
        assert!(err.is_malformed());
    }
}

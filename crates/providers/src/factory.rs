//! Language-model factory: builds the backend a request selected.
//!
//! A fresh client is built per request from that request's configuration.
//! There is no cache and no fallback to another vendor.

use deepsift_config::LlmProviderConfig;
use deepsift_core::{LanguageModel, ProviderError};
use std::sync::Arc;
use tracing::debug;

use crate::gemini::GeminiModel;
use crate::openai_compat::OpenAiCompatModel;

/// Build the language model described by `config`.
pub fn build_language_model(
    config: &LlmProviderConfig,
) -> Result<Arc<dyn LanguageModel>, ProviderError> {
    config
        .validate()
        .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;

    debug!(provider = %config.kind(), "Building language model");

    let model: Arc<dyn LanguageModel> = match config {
        LlmProviderConfig::Google { api_key, .. } => Arc::new(GeminiModel::new(api_key.clone())?),
        LlmProviderConfig::OpenAi {
            api_key, base_url, ..
        } => match base_url {
            Some(url) => Arc::new(OpenAiCompatModel::new("openai", url.clone(), Some(api_key.clone()))?),
            None => Arc::new(OpenAiCompatModel::openai(api_key.clone())?),
        },
        LlmProviderConfig::Custom {
            base_url, api_key, ..
        } => Arc::new(OpenAiCompatModel::new("custom", base_url.clone(), api_key.clone())?),
    };
    Ok(model)
}

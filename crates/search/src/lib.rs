//! Web search backends for deepsift.
//!
//! All backends implement the `deepsift_core::SearchProvider` trait.
//! [`build_search_provider`] constructs the one a request selected.

pub mod brave;
pub mod google;
pub mod searxng;

pub use brave::BraveSearch;
pub use google::GoogleGroundedSearch;
pub use searxng::SearxngSearch;

use deepsift_config::{SearchBackend, SearchProviderConfig};
use deepsift_core::{ProviderError, SearchProvider};
use std::sync::Arc;
use std::time::Duration;

/// Build the search backend described by `config`.
pub fn build_search_provider(
    config: &SearchProviderConfig,
) -> Result<Arc<dyn SearchProvider>, ProviderError> {
    config
        .validate()
        .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;

    let timeout = call_timeout(config);
    let max = config.max_results;

    tracing::debug!(provider = %config.kind(), timeout_secs = timeout.as_secs(), "Building search provider");

    let provider: Arc<dyn SearchProvider> = match &config.backend {
        SearchBackend::Google { api_key, model } => Arc::new(GoogleGroundedSearch::new(
            api_key.clone(),
            model.clone(),
            timeout,
            max,
        )?),
        SearchBackend::Brave { api_key } => Arc::new(BraveSearch::new(api_key.clone(), timeout, max)?),
        SearchBackend::Searxng { base_url } => Arc::new(SearxngSearch::new(base_url, timeout, max)?),
    };
    Ok(provider)
}

/// HTTP timeout for one search call.
///
/// Grounded search is a whole model generation, so it gets the LLM timeout.
/// `timeout_secs` bounds the plain search APIs.
fn call_timeout(config: &SearchProviderConfig) -> Duration {
    match config.backend {
        SearchBackend::Google { .. } => deepsift_providers::LLM_TIMEOUT,
        SearchBackend::Brave { .. } | SearchBackend::Searxng { .. } => {
            Duration::from_secs(config.timeout_secs)
        }
    }
}

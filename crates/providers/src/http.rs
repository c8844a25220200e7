//! Shared HTTP plumbing for backend clients.

use deepsift_core::ProviderError;
use std::time::Duration;
use tracing::warn;

/// Build a client with a request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("deepsift/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("failed to create HTTP client: {e}")))
}

/// Classify a transport-level failure.
pub fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Turn a non-success response into a classified error; pass successes through.
pub async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(provider, status = status.as_u16(), body = %truncate(&body, 500), "Provider returned error");
    Err(ProviderError::from_status(status.as_u16(), body))
}

/// Clip `s` to at most `max` characters.
pub fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

//! The retry policy every capability call goes through.
//!
//! Transient connectivity failures and malformed model output get one more
//! attempt. Authentication and configuration failures are returned at once.

use deepsift_core::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub max_retries: u32,
    /// Pause before retrying a transient failure
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no pause. Used by tests.
    pub fn immediate() -> Self {
        Self {
            backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Run `op`, retrying retryable failures up to the policy's limit.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(call = label, attempt, error = %e, "Retrying after failure");
                if e.is_transient() && !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(e) => {
                debug!(call = label, attempts = attempt + 1, error = %e, "Giving up");
                return Err(e);
            }
        }
    }
}

//! Retrying model calls that come back empty.
//!
//! Only blank output is retried. Transport errors propagate on the first
//! occurrence; the caller decides whether the whole unit of work fails.

use tracing::warn;

use feedlens_core::{defaults, Error, GenerationBackend, Result};

/// How many extra attempts a model call gets after an empty response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: defaults::LLM_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32) -> Self {
        Self { retries }
    }

    /// Read `LLM_MAX_RETRIES`, falling back to the default.
    pub fn from_env() -> Self {
        let retries = std::env::var("LLM_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::LLM_MAX_RETRIES);
        Self { retries }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Call the backend in JSON mode until it returns non-blank output.
///
/// Fails with [`Error::EmptyResponse`] after `retries + 1` blank responses.
pub async fn generate_non_empty(
    backend: &dyn GenerationBackend,
    system: &str,
    prompt: &str,
    policy: RetryPolicy,
) -> Result<String> {
    let attempts = policy.max_attempts();
    for attempt in 1..=attempts {
        let raw = backend.generate_json_with_system(system, prompt).await?;
        if !raw.trim().is_empty() {
            return Ok(raw);
        }
        warn!(
            subsystem = "inference",
            component = "retry",
            model = backend.model_name(),
            attempt,
            max_attempts = attempts,
            "Empty model output"
        );
    }
    Err(Error::EmptyResponse { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGenerationBackend, MockReply};

    #[tokio::test]
    async fn test_returns_first_non_empty() {
        let backend = MockGenerationBackend::new().with_script(vec![
            MockReply::text(""),
            MockReply::text("  \n"),
            MockReply::text("{\"ok\": true}"),
        ]);
        let out = generate_non_empty(&backend, "", "p", RetryPolicy::new(2))
            .await
            .unwrap();
        assert_eq!(out, "{\"ok\": true}");
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_exactly_retries_plus_one() {
        let backend = MockGenerationBackend::new().with_fixed_response("");
        let err = generate_non_empty(&backend, "", "p", RetryPolicy::new(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyResponse { attempts: 3 }));
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let backend = MockGenerationBackend::new().with_fixed_response("");
        let err = generate_non_empty(&backend, "", "p", RetryPolicy::new(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyResponse { attempts: 1 }));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_not_retried() {
        let backend =
            MockGenerationBackend::new().with_script(vec![MockReply::fail("connection refused")]);
        let err = generate_non_empty(&backend, "", "p", RetryPolicy::new(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert_eq!(backend.call_count(), 1);
    }

    #[test]
    fn test_default_policy() {
        assert_eq!(RetryPolicy::default().retries, 2);
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
    }

    #[test]
    fn test_max_attempts_saturates() {
        assert_eq!(RetryPolicy::new(u32::MAX).max_attempts(), u32::MAX);
    }
}

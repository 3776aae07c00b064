//! Augmentation-service interaction: one bounded-retry call per document.
//!
//! This module is intentionally thin — the instruction text lives in
//! [`crate::prompts`] and transport specifics in [`crate::services`], so the
//! retry behaviour can change without touching either.
//!
//! ## Retry Strategy
//!
//! Overload responses (HTTP 429/503, "overloaded" messages) usually clear
//! within seconds, and the pipeline is strictly sequential, so a fixed
//! backoff is enough: with the 5 s default and 5 attempts a document waits
//! at most 20 s before giving up. Non-transient errors (auth failures,
//! malformed responses) abort the document on the spot — retrying them
//! cannot succeed.

use crate::error::DocumentError;
use crate::services::{AugmentRequest, AugmentationService};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Bounded retry policy applied around the augmentation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first call. Always ≥ 1.
    pub max_attempts: u32,
    /// Fixed delay before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Call the augmentation service for one document, retrying transient
/// overloads up to the policy ceiling.
///
/// Returns the augmented text, or [`DocumentError::AugmentFailed`] recording
/// how many attempts were spent and the last failure detail. A non-transient
/// error returns after the attempt that hit it; only
/// [`is_transient`](crate::error::AugmentError::is_transient) failures are
/// retried.
pub async fn augment_document<A: AugmentationService>(
    service: &A,
    request: &AugmentRequest<'_>,
    policy: &RetryPolicy,
) -> Result<String, DocumentError> {
    let mut last_err: Option<String> = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        if attempt > 1 {
            warn!(
                "Augmentation retry {}/{} after {:?}",
                attempt, policy.max_attempts, policy.backoff
            );
            sleep(policy.backoff).await;
        }

        match service.augment(request).await {
            Ok(text) => {
                debug!("Augmentation succeeded on attempt {attempt}");
                return Ok(text);
            }
            Err(e) if e.is_transient() => {
                warn!("Augmentation attempt {attempt} overloaded: {e}");
                last_err = Some(e.to_string());
            }
            Err(e) => {
                warn!("Augmentation failed, not retrying: {e}");
                return Err(DocumentError::AugmentFailed {
                    attempts: attempt,
                    detail: e.to_string(),
                });
            }
        }
    }

    Err(DocumentError::AugmentFailed {
        attempts: policy.max_attempts,
        detail: last_err.unwrap_or_else(|| "unknown error".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AugmentError;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Fails with an overload signal for the first `overloaded` calls, then
    /// succeeds by echoing the request text with a suffix.
    struct ScriptedAugmentor {
        overloaded: usize,
        calls: AtomicUsize,
    }

    impl ScriptedAugmentor {
        fn overloaded_for(n: usize) -> Self {
            Self {
                overloaded: n,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl AugmentationService for ScriptedAugmentor {
        fn augment(
            &self,
            request: &AugmentRequest<'_>,
        ) -> impl Future<Output = Result<String, AugmentError>> + Send {
            async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.overloaded {
                    Err(AugmentError::Overloaded("503 model overloaded".into()))
                } else {
                    Ok(format!("{} [augmented]", request.text))
                }
            }
        }
    }

    struct BrokenAugmentor {
        calls: AtomicUsize,
    }

    impl AugmentationService for BrokenAugmentor {
        fn augment(
            &self,
            _request: &AugmentRequest<'_>,
        ) -> impl Future<Output = Result<String, AugmentError>> + Send {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(AugmentError::Service("invalid API key".into()))
            }
        }
    }

    fn request<'a>(instruction: &'a str, text: &'a str) -> AugmentRequest<'a> {
        AugmentRequest { instruction, text }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let service = ScriptedAugmentor::overloaded_for(2);
        let policy = fast_policy(5);
        let start = Instant::now();

        let text = augment_document(&service, &request("insert markers", "chapter text"), &policy)
            .await
            .unwrap();

        assert_eq!(text, "chapter text [augmented]");
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
        // Two retries means two backoff waits.
        assert!(start.elapsed() >= policy.backoff * 2);
    }

    #[tokio::test]
    async fn exhausts_retry_ceiling() {
        let service = ScriptedAugmentor::overloaded_for(usize::MAX);
        let policy = fast_policy(3);

        let err = augment_document(&service, &request("i", "t"), &policy)
            .await
            .unwrap_err();

        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
        match err {
            DocumentError::AugmentFailed { attempts, detail } => {
                assert_eq!(attempts, 3);
                assert!(detail.contains("overloaded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_transient_error_aborts_immediately() {
        let service = BrokenAugmentor {
            calls: AtomicUsize::new(0),
        };
        let policy = fast_policy(5);

        let err = augment_document(&service, &request("i", "t"), &policy)
            .await
            .unwrap_err();

        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        match err {
            DocumentError::AugmentFailed { attempts, detail } => {
                assert_eq!(attempts, 1);
                assert!(detail.contains("invalid API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_policy_matches_documented_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff, Duration::from_secs(5));
    }
}

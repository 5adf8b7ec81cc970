//! Retry and Error Recovery
//!
//! Wraps provider calls with bounded exponential-backoff retry. The default
//! policy allows a single retry; transient failures (HTTP 429, 5xx, network
//! errors) are retried, everything else fails immediately. Retrying is never
//! unbounded.

use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::provider::ProviderCallError;

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (default 1).
    pub max_retries: u32,
    /// Base delay in milliseconds (default 500).
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (default 8000).
    pub max_delay_ms: u64,
    /// Backoff multiplier (default 2.0).
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64)
    }
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Whether a provider failure is transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP 429 — rate limit.
    RateLimit,
    /// HTTP 500, 502, 503 — server-side errors.
    ServerError,
    /// Timeout, connection reset, or any failure without an HTTP status.
    NetworkError,
    /// Auth failures, bad requests, quota exhaustion: retrying cannot help.
    Fatal,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorKind::Fatal)
    }
}

/// Classify a provider error for the retry decision.
///
/// Errors carrying a [`ProviderCallError`] are classified by status;
/// anything else is assumed to be a transport-level failure.
pub fn classify(error: &anyhow::Error) -> ErrorKind {
    match error.downcast_ref::<ProviderCallError>() {
        Some(call) => match call.status {
            Some(429) => ErrorKind::RateLimit,
            Some(500) | Some(502) | Some(503) => ErrorKind::ServerError,
            Some(_) => ErrorKind::Fatal,
            None => ErrorKind::NetworkError,
        },
        None => ErrorKind::NetworkError,
    }
}

// ---------------------------------------------------------------------------
// Retry executor
// ---------------------------------------------------------------------------

/// Execute an async operation, retrying transient failures per the policy.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                let kind = classify(&err);
                if !kind.is_retryable() || attempt >= policy.max_retries {
                    if attempt > 0 {
                        warn!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "retries exhausted"
                        );
                    }
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    kind = ?kind,
                    delay_ms = delay.as_millis() as u64,
                    err = %err,
                    "retrying after transient error"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn delay_backs_off_exponentially_with_clamp() {
        let policy = RetryPolicy {
            max_retries: 4,
            base_delay_ms: 1000,
            max_delay_ms: 3000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(3000));
    }

    #[test]
    fn classification_by_status() {
        let rate = anyhow::Error::new(ProviderCallError::http(429, "slow down"));
        assert_eq!(classify(&rate), ErrorKind::RateLimit);

        let server = anyhow::Error::new(ProviderCallError::http(503, "unavailable"));
        assert_eq!(classify(&server), ErrorKind::ServerError);

        let auth = anyhow::Error::new(ProviderCallError::http(401, "bad key"));
        assert_eq!(classify(&auth), ErrorKind::Fatal);
        assert!(!classify(&auth).is_retryable());

        let transport = anyhow::anyhow!("connection reset");
        assert_eq!(classify(&transport), ErrorKind::NetworkError);
    }

    #[tokio::test]
    async fn transient_error_is_retried_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay_ms: 1,
            max_delay_ms: 10,
            backoff_multiplier: 2.0,
        };

        let counter = calls.clone();
        let result = with_retry(&policy, "test", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(anyhow::Error::new(ProviderCallError::http(500, "boom")))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();

        let counter = calls.clone();
        let result: Result<()> = with_retry(&policy, "test", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::Error::new(ProviderCallError::http(401, "no auth")))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        };

        let counter = calls.clone();
        let result: Result<()> = with_retry(&policy, "test", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("still down"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3); // initial + 2 retries
    }
}

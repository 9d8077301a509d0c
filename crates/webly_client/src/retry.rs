//! Bounded retries with exponential backoff.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ClientResult;

/// Retry policy for backend calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            multiplier: 2.0,
            max_backoff_ms: 8000,
        }
    }
}

impl RetryPolicy {
    /// Retry without waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            multiplier: 1.0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1) as i32;
        let ms = self.initial_backoff_ms as f64 * self.multiplier.powi(exp);
        Duration::from_millis((ms as u64).min(self.max_backoff_ms))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// attempts run out. The last error is returned.
    pub async fn retry<T, F, Fut>(&self, label: &str, mut op: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label, attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff(6), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = RetryPolicy::immediate(3)
            .retry("repair", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ClientError::Transport("connection reset".into()))
                } else {
                    Ok("fixed")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "fixed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: ClientResult<()> = RetryPolicy::immediate(3)
            .retry("repair", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Status { status: 503, body: "busy".into() })
            })
            .await;

        assert!(matches!(result, Err(ClientError::Status { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_client_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: ClientResult<()> = RetryPolicy::immediate(3)
            .retry("commands", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Status { status: 400, body: "bad".into() })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! Linear-backoff retry for flaky outbound calls.

use std::future::Future;
use std::time::Duration;

use domains::{DomainError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Wait after the n-th failure is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, backoff: Duration::from_secs(1) }
    }
}

/// Errors a retry cannot fix.
fn is_permanent(err: &DomainError) -> bool {
    matches!(
        err,
        DomainError::Validation(_)
            | DomainError::InvalidForm(_)
            | DomainError::Unauthorized(_)
            | DomainError::Forbidden(_)
            | DomainError::NotFound { .. }
            | DomainError::Configuration(_)
    )
}

/// Runs `op` up to `policy.attempts` times. `op` receives the 1-based attempt
/// number. The last error is returned if every attempt fails.
pub async fn retry_with_linear_backoff<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts || is_permanent(&err) => {
                tracing::error!(%label, attempt, error = %err, "giving up");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.backoff * attempt;
                tracing::warn!(%label, attempt, error = %err, ?delay, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const POLICY: RetryPolicy = RetryPolicy { attempts: 3, backoff: Duration::from_millis(100) };

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = retry_with_linear_backoff(POLICY, "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(DomainError::Storage("disk busy".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms after the first failure, 200ms after the second
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_after_all_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_linear_backoff(POLICY, "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(DomainError::Storage(format!("failure {attempt}"))) }
        })
        .await;

        assert!(matches!(result, Err(DomainError::Storage(msg)) if msg == "failure 3"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_linear_backoff(POLICY, "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DomainError::Validation("bad owner".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

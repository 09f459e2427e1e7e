//! Retry policy for transient coordination failures.
//!
//! Only retryable errors (transport, timeout) are retried; session loss and
//! structural errors surface immediately. Reconnection itself belongs to
//! the client — by the time an operation is retried here, either the
//! session survived (the retry is a plain re-issue) or the next attempt
//! reports session loss.

use std::future::Future;
use std::time::Duration;

use coordination::CoordinationResult;
use tracing::warn;

/// Default maximum retry attempts for transient failures.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Retry policy applied to retryable coordination errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (actual delay uses exponential backoff).
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Run `op`, retrying retryable failures with exponential backoff.
pub(crate) async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> CoordinationResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoordinationResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    what,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient coordination failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::CoordinationError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tracing_test::traced_test;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(policy.base_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_transient_failures_eventually_succeed() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result = with_retries(&policy, "probe", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CoordinationError::Transport("blip".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(logs_contain("transient coordination failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhaust_to_last_error() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
        };
        let calls = AtomicU32::new(0);
        let result: CoordinationResult<()> = with_retries(&policy, "probe", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CoordinationError::Timeout("still down".into())) }
        })
        .await;
        assert!(result.unwrap_err().is_retryable());
        // initial call plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_surface_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: CoordinationResult<()> = with_retries(&policy, "probe", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CoordinationError::SessionLost("expired".into())) }
        })
        .await;
        assert!(result.unwrap_err().is_session_loss());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

use std::future::Future;
use std::time::Duration;

use orderstore_core::storage::Result;

/// Bounded exponential backoff for throttling-class errors.
///
/// The remote service documents transient capacity exhaustion as an
/// expected client responsibility, so every client operation runs under
/// this policy. Non-throttling errors are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    pub(crate) fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs `op`, retrying throttled attempts until the policy is exhausted.
pub(crate) async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_throttling() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay(attempt);
                tracing::warn!(attempt, ?delay, "throttled by the table service, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use orderstore_core::storage::StoreError;

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_delay_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        };

        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(10), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_throttling() {
        let calls = AtomicU32::new(0);

        let result = with_backoff(&fast_policy(3), || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < 2 {
                    Err(StoreError::Throttled("capacity".to_string()))
                } else {
                    Ok(call)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistent_throttling_surfaces_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_backoff(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Throttled("capacity".to_string())) }
        })
        .await;

        assert_eq!(result, Err(StoreError::Throttled("capacity".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_throttling_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_backoff(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Validation("bad key".to_string())) }
        })
        .await;

        assert_eq!(result, Err(StoreError::Validation("bad key".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

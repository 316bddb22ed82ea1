use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): base * 2^retry, capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// Only errors for which `is_transient` returns true are retried; at most
/// `max_retries + 1` attempts are made and the last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_transient: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retry = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if retry > 0 {
                    tracing::info!("{} succeeded after {} retries", operation_name, retry);
                }
                return Ok(value);
            }
            Err(e) if is_transient(&e) && retry < policy.max_retries => {
                let delay = policy.delay_for(retry);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation_name,
                    retry + 1,
                    policy.max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(e) => {
                if is_transient(&e) {
                    tracing::error!(
                        "{} failed after {} attempts: {}",
                        operation_name,
                        retry + 1,
                        e
                    );
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(80), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_succeeds_after_two_transient_failures() {
        let calls = AtomicU32::new(0);

        let result = retry_with_backoff(&fast_policy(), "insert", StoreError::is_transient, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(StoreError::Connection("connection not open".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(tokio_test::assert_ok!(result), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);

        let result: Result<(), StoreError> =
            retry_with_backoff(&fast_policy(), "insert", StoreError::is_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Timeout("slow".into()))
            })
            .await;

        tokio_test::assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), StoreError> =
            retry_with_backoff(&fast_policy(), "insert", StoreError::is_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::OpenPositionExists("TOKEN".into()))
            })
            .await;

        assert_eq!(result, Err(StoreError::OpenPositionExists("TOKEN".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

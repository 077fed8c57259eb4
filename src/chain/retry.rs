//! Bounded fixed-delay retry for gateway calls

use backoff::backoff::Backoff;
use backoff::future::retry_notify;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How many times a gateway call is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let backoff = BoundedConstant::new(*self);

        retry_notify(
            backoff,
            || {
                let attempt = op();
                async move {
                    match attempt.await {
                        Ok(value) => Ok(value),
                        Err(e) if e.is_retryable() => Err(backoff::Error::transient(e)),
                        Err(e) => {
                            debug!("{} failed permanently: {}", what, e);
                            Err(backoff::Error::permanent(e))
                        }
                    }
                }
            },
            |e: Error, wait: Duration| {
                warn!("{} failed: {} (retrying in {:?})", what, e, wait);
            },
        )
        .await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(200))
    }
}

/// Constant delay, `attempts - 1` retries, then give up
#[derive(Debug, Clone)]
struct BoundedConstant {
    policy: RetryPolicy,
    remaining: u32,
}

impl BoundedConstant {
    fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            remaining: policy.attempts.saturating_sub(1),
        }
    }
}

impl Backoff for BoundedConstant {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.policy.delay)
    }

    fn reset(&mut self) {
        self.remaining = self.policy.attempts.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_bounded_constant() {
        let mut backoff = BoundedConstant::new(RetryPolicy::new(3, Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), None);

        backoff.reset();
        assert!(backoff.next_backoff().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(200));

        let value = policy
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Rpc("503".into()))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(200));

        let result: Result<()> = policy
            .run("down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::NotFound("tx".into()))
            })
            .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<()> = policy
            .run("parse", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Parse("not a pool".into()))
            })
            .await;

        assert!(matches!(result, Err(Error::Parse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

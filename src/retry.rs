//! Retry policy for transient gateway failures.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use backoff::ExponentialBackoff;
use tracing::warn;

/// Exponential backoff parameters applied to retried gateway calls.
///
/// The default policy retries indefinitely; use [`RetryPolicy::bounded`] for
/// calls that should eventually give up.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 2.0,
            max_interval: Duration::from_secs(30),
            max_elapsed: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that stops retrying after `max_elapsed` of total wait.
    pub fn bounded(max_elapsed: Duration) -> Self {
        Self {
            max_elapsed: Some(max_elapsed),
            ..Self::default()
        }
    }

    fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            multiplier: self.multiplier,
            max_interval: self.max_interval,
            max_elapsed_time: self.max_elapsed,
            ..ExponentialBackoff::default()
        }
    }

    /// Run `op` until it succeeds or the policy is exhausted. Every failure
    /// is treated as transient and logged before the next attempt.
    pub async fn retry<T, Op, Fut>(&self, what: &str, mut op: Op) -> Result<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        backoff::future::retry(self.to_backoff(), move || {
            let fut = op();
            async move {
                fut.await.map_err(|err| {
                    warn!(operation = what, error = %err, "transient gateway error, retrying");
                    backoff::Error::transient(err)
                })
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let value: u32 = policy
            .retry("test op", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        anyhow::bail!("not yet")
                    }
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn bounded_policy_gives_up() {
        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(1),
            ..RetryPolicy::bounded(Duration::from_millis(20))
        };
        let result: Result<()> = policy
            .retry("always failing", || async { anyhow::bail!("down") })
            .await;
        assert!(result.is_err());
    }
}

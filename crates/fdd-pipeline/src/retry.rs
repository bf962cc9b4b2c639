//! # Retry Policies
//!
//! Exponential backoff with jitter over transient errors, interruptible
//! by cancellation. Each stage carries its own policy from
//! configuration; non-transient errors return immediately.

use std::time::Duration;

use fdd_core::RetryConfig;
use rand::Rng;

use crate::cancel::CancelToken;

/// A stage's retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            factor: config.factor,
        }
    }
}

/// Why a retried operation ultimately failed.
#[derive(Debug)]
pub enum RetryOutcome<E> {
    /// The final transient error after exhausting attempts.
    Exhausted(E),
    /// A non-transient error, returned without further attempts.
    Fatal(E),
    /// Cancellation was signalled between attempts.
    Cancelled,
}

impl RetryPolicy {
    /// Backoff before the given 1-based attempt, with up to 20% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.factor.powi(attempt.saturating_sub(1) as i32);
        let base = self.base_delay.as_millis() as f64 * exp;
        let capped = base.min(self.max_delay.as_millis() as f64);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((capped * jitter) as u64)
    }

    /// Run `op` until it succeeds, fails permanently, exhausts
    /// attempts, or the token cancels. `is_transient` classifies
    /// errors.
    pub async fn run<T, E, Fut>(
        &self,
        cancel: &CancelToken,
        is_transient: impl Fn(&E) -> bool,
        mut op: impl FnMut() -> Fut,
    ) -> Result<T, RetryOutcome<E>>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(RetryOutcome::Cancelled);
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !is_transient(&e) => return Err(RetryOutcome::Fatal(e)),
                Err(e) => {
                    if attempt == self.max_attempts {
                        return Err(RetryOutcome::Exhausted(e));
                    }
                    let delay = self.delay_for(attempt);
                    tracing::warn!(attempt, max = self.max_attempts, ?delay, "transient failure, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(RetryOutcome::Cancelled),
                    }
                }
            }
        }
        Err(RetryOutcome::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            factor: 2.0,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let result: Result<u32, _> = fast_policy(3)
            .run(&CancelToken::never(), |_: &&str| true, move || {
                let calls = calls_in.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("down")
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_do_not_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let result: Result<u32, _> = fast_policy(3)
            .run(&CancelToken::never(), |_: &&str| false, move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("broken")
                }
            })
            .await;
        assert!(matches!(result, Err(RetryOutcome::Fatal("broken"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let result: Result<u32, _> = fast_policy(3)
            .run(&CancelToken::never(), |_: &&str| true, move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("down")
                }
            })
            .await;
        assert!(matches!(result, Err(RetryOutcome::Exhausted("down"))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let (handle, token) = CancelToken::new();
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
            factor: 2.0,
        };
        let run = tokio::spawn(async move {
            policy
                .run(&token, |_: &&str| true, || async { Err::<u32, _>("down") })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("cancel must interrupt the backoff sleep")
            .unwrap();
        assert!(matches!(result, Err(RetryOutcome::Cancelled)));
    }

    #[test]
    fn delays_grow_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(3000),
            factor: 2.0,
        };
        let d1 = policy.delay_for(1);
        let d3 = policy.delay_for(3);
        assert!(d1 >= Duration::from_millis(800) && d1 <= Duration::from_millis(1200));
        // 4000ms capped at 3000ms, ±20% jitter.
        assert!(d3 >= Duration::from_millis(2400) && d3 <= Duration::from_millis(3600));
    }
}

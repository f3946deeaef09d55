//! Retry with exponential backoff and jitter.
//!
//! [`execute`] wraps a remote call: retryable failures sleep for
//! `min(base_delay * backoff_multiplier^attempt, max_delay)` plus uniform
//! jitter, then retry; fatal failures and exhausted attempts propagate the
//! last error immediately. Jitter makes individual delays non-deterministic
//! by design — tests assert against [`RetryPolicy::delay_bounds`], never
//! exact values.

use crate::error::{ClientError, ClientResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Backoff parameters for one retry channel.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound on the computed delay, before jitter.
    pub max_delay: Duration,
    /// Exponential growth factor.
    pub backoff_multiplier: f64,
    /// Fraction of the delay added as uniform jitter, in `[0, 1]`.
    pub jitter_fraction: f64,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and the default
    /// backoff curve (250ms base, 30s cap, doubling, 25% jitter).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.25,
        }
    }

    /// A single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter_fraction: 0.0,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction.
    pub fn with_jitter_fraction(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Deterministic `[min, max]` envelope of the delay applied after the
    /// given 0-based failed attempt.
    pub fn delay_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let base = self.base_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        (
            Duration::from_secs_f64(capped),
            Duration::from_secs_f64(capped * (1.0 + self.jitter_fraction)),
        )
    }

    /// Samples the jittered delay applied after the given failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let (min, _) = self.delay_bounds(attempt);
        if self.jitter_fraction <= 0.0 {
            return min;
        }
        let jitter = min.as_secs_f64() * self.jitter_fraction * rand::thread_rng().gen::<f64>();
        min + Duration::from_secs_f64(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Executes `call` under the policy.
///
/// Emits one structured log event per attempt. The error of the final
/// failed attempt is the one propagated.
pub async fn execute<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        trace!(operation, attempt, "remote call attempt");
        match call().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt, "remote call recovered after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                warn!(operation, attempt, error = %err, "remote call failed");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_bounds_follow_the_curve() {
        let policy = RetryPolicy::new(5)
            .with_base_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .with_jitter_fraction(0.25);

        let (min0, max0) = policy.delay_bounds(0);
        assert_eq!(min0, Duration::from_millis(100));
        assert_eq!(max0, Duration::from_millis(125));

        let (min2, max2) = policy.delay_bounds(2);
        assert_eq!(min2, Duration::from_millis(400));
        assert_eq!(max2, Duration::from_millis(500));
    }

    #[test]
    fn delay_respects_cap() {
        let policy = RetryPolicy::new(10)
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        let (min, max) = policy.delay_bounds(6);
        assert_eq!(min, Duration::from_secs(5));
        assert!(max <= Duration::from_secs_f64(5.0 * 1.25));
    }

    #[test]
    fn sampled_delay_stays_in_bounds() {
        let policy = RetryPolicy::new(4)
            .with_base_delay(Duration::from_millis(80))
            .with_jitter_fraction(0.5);
        for attempt in 0..4 {
            let (min, max) = policy.delay_bounds(attempt);
            let sampled = policy.delay_for_attempt(attempt);
            assert!(sampled >= min, "attempt {attempt}");
            assert!(sampled <= max, "attempt {attempt}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failure_attempts_exactly_max() {
        let policy = RetryPolicy::new(3).with_base_delay(Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        let result: ClientResult<()> = execute(&policy, "list", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ClientError::status(503, "unavailable")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ClientError::Status { code: 503, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failure_is_not_retried() {
        let policy = RetryPolicy::new(5);
        let calls = AtomicU32::new(0);

        let result: ClientResult<()> = execute(&policy, "select", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ClientError::status(404, "gone")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let policy = RetryPolicy::new(4).with_base_delay(Duration::from_millis(5));
        let calls = AtomicU32::new(0);

        let result = execute(&policy, "login", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ClientError::network("reset"))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

//! Per-channel rate limiting.
//!
//! A [`RateLimiter`] enforces a minimum interval between granted calls on
//! one logical channel ("authentication", "data"). Instances are owned by
//! the client and passed where needed; there is no module-level shared
//! state.
//!
//! The grant slot lives behind a `tokio::sync::Mutex`, whose FIFO wait
//! queue gives arrival-order granting: exactly one caller proceeds per
//! interval tick, later arrivals suspend (no busy-waiting), and no caller
//! can be starved.
//!
//! Deployment constraint: the last-grant timestamp is in-process state. If
//! sync workers run as separate processes, either serialize all sync
//! activity through one worker or back the limiter with shared storage.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Minimum-interval gate for one logical channel.
#[derive(Debug)]
pub struct RateLimiter {
    channel: &'static str,
    min_interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `per_second` calls per second.
    ///
    /// # Panics
    ///
    /// Panics if `per_second` is not strictly positive.
    pub fn per_second(channel: &'static str, per_second: f64) -> Self {
        assert!(per_second > 0.0, "rate must be positive");
        Self {
            channel,
            min_interval: Duration::from_secs_f64(1.0 / per_second),
            last_grant: Mutex::new(None),
        }
    }

    /// Creates a limiter with an explicit minimum inter-call interval.
    pub fn with_interval(channel: &'static str, min_interval: Duration) -> Self {
        Self {
            channel,
            min_interval,
            last_grant: Mutex::new(None),
        }
    }

    /// Returns the channel name.
    pub fn channel(&self) -> &'static str {
        self.channel
    }

    /// Returns the minimum inter-call interval.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the interval since the last granted call has elapsed,
    /// then records the new grant.
    pub async fn acquire(&self) {
        let mut last = self.last_grant.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                trace!(
                    channel = self.channel,
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "rate limiter waiting"
                );
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

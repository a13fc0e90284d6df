//! Spacing for bursts of outgoing messages.
//!
//! Fan-out commands (federation bans, fed stat queries) send one message
//! per target; the limiter keeps them apart so Telegram does not answer
//! with `FLOOD_WAIT`.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Rate limiter that enforces minimum intervals between operations.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum duration between allowed operations.
    min_interval: Duration,

    /// Earliest time the next operation may run.
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Waits until an operation is allowed, then reserves the next slot.
    ///
    /// Returns the duration waited (0 if no wait was needed).
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut next = self.next_allowed.lock().await;

        let wait_duration = next
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or_default();

        if !wait_duration.is_zero() {
            debug!("Rate limiter: waiting {:?} before next send", wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        *next = Some(Instant::now() + self.min_interval);
        wait_duration
    }

    /// Returns the time remaining until the next operation is allowed.
    #[cfg(test)]
    pub async fn time_until_allowed(&self) -> Duration {
        self.next_allowed
            .lock()
            .await
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    /// Pushes the next slot back by a flood wait reported by Telegram.
    pub async fn handle_flood_wait(&self, wait_seconds: u32) {
        warn!("Received flood wait from Telegram: {} seconds", wait_seconds);
        let until = Instant::now() + Duration::from_secs(u64::from(wait_seconds));
        let mut next = self.next_allowed.lock().await;
        if next.is_none_or(|at| at < until) {
            *next = Some(until);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_first_operation() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert_eq!(limiter.time_until_allowed().await, Duration::ZERO);

        let waited = limiter.wait_and_acquire().await;
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_operations() {
        let limiter = RateLimiter::from_millis(50);

        limiter.wait_and_acquire().await;
        assert!(limiter.time_until_allowed().await > Duration::ZERO);

        let waited = limiter.wait_and_acquire().await;
        assert!(waited > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_flood_wait_extends_slot() {
        let limiter = RateLimiter::from_millis(10);
        limiter.handle_flood_wait(30).await;
        assert!(limiter.time_until_allowed().await > Duration::from_secs(29));
    }
}

//! Minimum-spacing rate limiter shared by a provider's calls.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Enforces a minimum interval between calls.
///
/// The limiter owns a mutex-guarded last-call instant; a caller that
/// arrives early sleeps while still holding the lock, so concurrent callers
/// serialize and each departs at least `min_interval` after the previous
/// one. Inject one limiter per provider that needs pacing.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter with the given minimum spacing between calls
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the spacing since the previous call has elapsed
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

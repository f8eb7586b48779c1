//! Bounded fixed-interval polling.

use std::future::Future;
use std::time::Duration;

/// Poll `attempts` times, sleeping `interval` between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for WaitPolicy {
    /// 2 seconds x 30 attempts.
    fn default() -> Self {
        Self::new(Duration::from_secs(2), 30)
    }
}

impl WaitPolicy {
    pub fn new(interval: Duration, attempts: u32) -> Self {
        Self { interval, attempts }
    }

    /// Upper bound on time spent sleeping.
    pub fn total(&self) -> Duration {
        self.interval * self.attempts
    }

    /// Calls `check` with the 1-based attempt number until it returns true.
    /// Returns the successful attempt, or `None` once attempts run out.
    pub async fn poll<F, Fut>(&self, mut check: F) -> Option<u32>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = bool>,
    {
        for attempt in 1..=self.attempts {
            if check(attempt).await {
                return Some(attempt);
            }
            if attempt < self.attempts && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
        }
        None
    }
}

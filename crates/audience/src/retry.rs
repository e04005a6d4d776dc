use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry with a fixed delay between attempts.
///
/// Every retry waits the same `delay_ms`. Callers pair this with a
/// retryable-error predicate; anything else propagates on the first failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before each retry, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempt` attempts have
    /// already been made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to observe before the next attempt.
    pub fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

//! Retry policy for offer POSTs
//!
//! WHIP/WHEP servers answer 503 under load and expect clients to retry
//! with backoff. The policy here is deliberately small: a bounded number
//! of attempts with exponential, capped delays.

use std::time::Duration;

/// Bounded exponential backoff for signaling requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (default: 3)
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds
    /// (default: 1000ms)
    pub base_delay_ms: u64,
    /// Upper bound on any delay, in milliseconds (default: 5000ms)
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt `attempt`
    ///
    /// `min(base * 2^(attempt - 1), max)` for `attempt >= 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Whether another attempt is allowed after `attempts` have been made
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

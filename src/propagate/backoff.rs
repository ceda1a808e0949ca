//! Retry policy for transaction conflicts
//!
//! Deterministic exponential doubling with a cap. Conflicted mutations are
//! re-run from a fresh read, so the delay only has to spread contending
//! writers out, not randomize them.

use crate::config::PropagationConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_ms: u64,
    max_ms: u64,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_ms: u64, max_ms: u64) -> Self {
        Self {
            max_attempts,
            base_ms,
            max_ms,
        }
    }

    pub fn from_config(config: &PropagationConfig) -> Self {
        Self::new(
            config.max_retry_attempts,
            config.retry_base_ms,
            config.retry_max_ms,
        )
    }

    /// Total number of attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retrying after the given zero-based failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(attempt.min(20)));
        Duration::from_millis(exponential.min(self.max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth() {
        let policy = RetryPolicy::new(5, 100, 10_000);
        assert_eq!(policy.delay(0).as_millis(), 100);
        assert_eq!(policy.delay(1).as_millis(), 200);
        assert_eq!(policy.delay(2).as_millis(), 400);
    }

    #[test]
    fn test_capped_at_max() {
        let policy = RetryPolicy::new(5, 100, 1_000);
        assert_eq!(policy.delay(10).as_millis(), 1_000);
        assert_eq!(policy.delay(40).as_millis(), 1_000);
    }
}

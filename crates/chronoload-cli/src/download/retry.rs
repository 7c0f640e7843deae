//! Backoff and batch-contraction rules

use crate::config::{
    Config, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INITIAL_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
};
use std::time::Duration;

/// Below this cumulative success rate the batch size is halved
pub const CONTRACTION_THRESHOLD: f64 = 0.5;

/// Bounded retry with capped exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per URL, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay to wait before `attempt` (1-based).
    ///
    /// `None` for the first attempt and for attempts past `max_attempts`.
    /// Otherwise `min(initial * 2^(attempt - 2), max)`.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt < 2 || attempt > self.max_attempts {
            return None;
        }

        let factor = 2u32.checked_pow(attempt - 2).unwrap_or(u32::MAX);
        let delay = self
            .initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}

/// Batch size to use after a batch, given cumulative counts for the run.
///
/// Halves (floor, minimum 1) when fewer than half of the attempted chunks
/// have succeeded so far. Never grows.
pub fn next_batch_size(current: usize, succeeded: usize, attempted: usize) -> usize {
    if attempted == 0 || current <= 1 {
        return current.max(1);
    }

    let rate = succeeded as f64 / attempted as f64;
    if rate < CONTRACTION_THRESHOLD {
        (current / 2).max(1)
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.delay_before(2), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay_before(3), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay_before(4), None);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        };
        assert_eq!(policy.delay_before(5), Some(Duration::from_millis(8000)));
        assert_eq!(policy.delay_before(6), Some(Duration::from_millis(10_000)));
        assert_eq!(policy.delay_before(10), Some(Duration::from_millis(10_000)));
    }

    #[test]
    fn test_batch_contraction() {
        assert_eq!(next_batch_size(6, 2, 6), 3);
        assert_eq!(next_batch_size(3, 3, 9), 1);
        assert_eq!(next_batch_size(1, 0, 10), 1);
        assert_eq!(next_batch_size(7, 0, 7), 3);
    }

    #[test]
    fn test_batch_size_holds_at_threshold() {
        assert_eq!(next_batch_size(6, 3, 6), 6);
        assert_eq!(next_batch_size(6, 6, 6), 6);
        assert_eq!(next_batch_size(4, 0, 0), 4);
    }

    #[test]
    fn test_batch_size_never_grows() {
        let mut size = 8;
        let mut history = vec![size];
        let mut succeeded = 0;
        let mut attempted = 0;
        for outcome in [0, 0, 4, 4, 4] {
            attempted += size;
            succeeded += outcome.min(size);
            size = next_batch_size(size, succeeded, attempted);
            history.push(size);
        }
        assert!(history.windows(2).all(|w| w[1] <= w[0]));
    }
}

//! Reconnect backoff policy

use std::time::Duration;

/// Exponential backoff without jitter
///
/// The delay before reconnect attempt `n` (1-based) is `base * 2^(n-1)`.
/// There is no delay cap; the attempt budget bounds the total wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 5)
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the given attempt, or `None` once the budget is spent
    ///
    /// Within the budget the delay saturates at `Duration::MAX` rather than
    /// overflowing.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let delay = 1u32
            .checked_shl(attempt - 1)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay(), Duration::from_millis(1000));
        assert_eq!(policy.max_attempts(), 5);
        // Final wait before giving up
        assert_eq!(policy.delay_for(5), Some(Duration::from_secs(16)));
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let base = Duration::from_millis(1000);
        let policy = ReconnectPolicy::new(base, 5);
        for n in 1..=5u32 {
            assert_eq!(policy.delay_for(n), Some(base * 2u32.pow(n - 1)));
        }
    }

    #[test]
    fn test_delay_outside_budget() {
        let policy = ReconnectPolicy::new(Duration::from_millis(100), 3);
        assert_eq!(policy.delay_for(0), None);
        assert_eq!(policy.delay_for(4), None);
    }

    #[test]
    fn test_zero_attempt_budget() {
        let policy = ReconnectPolicy::new(Duration::from_millis(100), 0);
        assert_eq!(policy.delay_for(1), None);
    }

    #[test]
    fn test_large_budget_saturates_instead_of_giving_up() {
        let policy = ReconnectPolicy::new(Duration::from_millis(1), 40);
        assert_eq!(
            policy.delay_for(32),
            Some(Duration::from_millis(1) * (1u32 << 31))
        );
        assert_eq!(policy.delay_for(33), Some(Duration::MAX));
        assert_eq!(policy.delay_for(40), Some(Duration::MAX));
        assert_eq!(policy.delay_for(41), None);

        let policy = ReconnectPolicy::new(Duration::from_secs(u64::MAX), u32::MAX);
        assert_eq!(policy.delay_for(2), Some(Duration::MAX));
    }
}

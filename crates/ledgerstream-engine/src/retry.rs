//! Retry policy: bounded attempts with capped exponential backoff.

use std::time::Duration;

use rand::Rng;

/// Bounds and timing for the dispatch loop's retries.
///
/// Conflict retries and storage retries are counted separately: a
/// conflict means another writer won the version race and a fresh
/// load-handle-commit cycle is needed, while a storage retry re-attempts
/// the same commit after a transient infrastructure failure.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional load-handle-commit cycles after a conflict.
    pub max_conflict_retries: u32,
    /// Additional commit attempts after a transient storage failure.
    pub max_storage_retries: u32,
    /// Backoff before the first storage retry; doubles per attempt.
    pub base_backoff: Duration,
    /// Upper bound on any single backoff delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            max_storage_retries: 3,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Returns the delay before storage retry number `attempt` (1-based):
    /// exponential doubling capped at `max_backoff`, minus a uniform
    /// jitter of up to half the delay so racing retriers spread out.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_backoff
            .saturating_mul(2_u32.saturating_pow(exponent))
            .min(self.max_backoff);
        let jitter_cap = delay / 2;
        let jitter = rand::rng().random_range(Duration::ZERO..=jitter_cap);
        delay - jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            ..RetryPolicy::default()
        };

        // Jitter subtracts at most half, so the floor is delay / 2.
        let first = policy.backoff_delay(1);
        assert!(first >= Duration::from_millis(50) && first <= Duration::from_millis(100));

        let second = policy.backoff_delay(2);
        assert!(second >= Duration::from_millis(100) && second <= Duration::from_millis(200));

        let capped = policy.backoff_delay(10);
        assert!(capped >= Duration::from_millis(150) && capped <= Duration::from_millis(300));
    }
}

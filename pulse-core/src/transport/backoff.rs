//! Reconnect backoff schedule.

use rand::Rng;
use std::time::Duration;

/// Default delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default ceiling for the nominal delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff with multiplicative jitter.
///
/// `delay(n) = min(max_delay, base * 2^(n-1)) * uniform(0.5, 1.5)` where `n`
/// counts consecutive failures starting at 1. There is no attempt limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_delay: Duration,
    /// Apply the `uniform(0.5, 1.5)` factor
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { base: DEFAULT_BASE_DELAY, max_delay: DEFAULT_MAX_DELAY, jitter: true }
    }
}

impl BackoffPolicy {
    /// Backoff without jitter, mostly useful for deterministic schedules.
    pub fn fixed(base: Duration, max_delay: Duration) -> Self {
        Self { base, max_delay, jitter: false }
    }

    /// Delay before jitter for the given attempt.
    ///
    /// Non-decreasing in `attempt` and never above `max_delay`.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << exponent).min(self.max_delay)
    }

    /// Delay to wait before the given attempt, jitter included.
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if !self.jitter || nominal.is_zero() {
            return nominal;
        }
        nominal.mul_f64(rng.gen_range(0.5..1.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_delay_doubles_until_ceiling() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(100), Duration::from_millis(1000));
        let delays: Vec<u64> =
            (1..=6).map(|n| policy.nominal_delay(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_nominal_delay_is_monotonic_for_huge_attempts() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..200 {
            let delay = policy.nominal_delay(attempt);
            assert!(delay >= previous);
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
        assert_eq!(policy.nominal_delay(u32::MAX), policy.max_delay);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = BackoffPolicy::default();
        let mut rng = rand::thread_rng();
        for attempt in 1..10 {
            let nominal = policy.nominal_delay(attempt);
            for _ in 0..50 {
                let delay = policy.delay(attempt, &mut rng);
                assert!(delay >= nominal.mul_f64(0.5));
                assert!(delay <= nominal.mul_f64(1.5));
            }
        }
    }

    #[test]
    fn test_fixed_policy_has_no_jitter() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(250), Duration::from_secs(5));
        let mut rng = rand::thread_rng();
        assert_eq!(policy.delay(3, &mut rng), Duration::from_millis(1000));
    }
}

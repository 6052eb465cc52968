//! Bounded exponential backoff.

use std::time::Duration;

/// Deterministic exponential backoff capped at `max`.
///
/// Attempt 1 waits `initial`, each further attempt multiplies by `factor`
/// until `max` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Growth factor per attempt.
    pub factor: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(30),
            factor: 2,
        }
    }
}

impl Backoff {
    /// Returns the delay for the given 1-based attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.factor.max(1).checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(multiplier)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_capped() {
        let backoff = Backoff {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(700),
            factor: 2,
        };

        let delays: Vec<u128> = (1..=6).map(|a| backoff.delay(a).as_millis()).collect();

        assert_eq!(delays, vec![100, 200, 400, 700, 700, 700]);
    }

    #[test]
    fn test_delay_saturates_on_huge_attempts() {
        let backoff = Backoff::default();

        assert_eq!(backoff.delay(u32::MAX), backoff.max);
    }

    #[test]
    fn test_attempt_zero_behaves_like_first() {
        let backoff = Backoff::default();

        assert_eq!(backoff.delay(0), backoff.initial);
    }
}

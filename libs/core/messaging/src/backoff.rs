//! Retry policies for the fetch loop and publish path.

use core_config::gateway::ConsumerTuning;
use std::time::Duration;

/// Back-off selection for retried operations.
///
/// `attempt` is the 1-based count of consecutive failures; `next_delay`
/// answers "how long to sleep before trying again".
#[derive(Debug, Clone)]
pub enum RetryPolicy {
    /// Exponential backoff: `initial * multiplier^(attempt-1)`, capped at `max`
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },

    /// Fixed delay between attempts
    Fixed(Duration),

    /// No delay, no retry
    None,
}

impl RetryPolicy {
    /// Exponential policy from consumer tuning.
    pub fn from_tuning(tuning: &ConsumerTuning) -> Self {
        Self::Exponential {
            initial: tuning.backoff_initial,
            multiplier: tuning.backoff_multiplier,
            max: tuning.backoff_max,
        }
    }

    /// Delay before the next attempt, given `attempt` consecutive
    /// failures so far. Returns `None` when no retry should happen.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return None;
        }

        match self {
            RetryPolicy::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                let delay = initial.mul_f64(factor.max(0.0));
                Some(delay.min(*max))
            }
            RetryPolicy::Fixed(delay) => Some(*delay),
            RetryPolicy::None => None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Exponential {
            initial: Duration::from_millis(500),
            multiplier: 2.0,
            max: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_default_sequence() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(4), Some(Duration::from_secs(4)));
        assert_eq!(policy.next_delay(7), Some(Duration::from_secs(30))); // 32s capped
        assert_eq!(policy.next_delay(20), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_exponential_monotone_until_cap() {
        let policy = RetryPolicy::default();

        let mut previous = Duration::ZERO;
        for attempt in 1..=16 {
            let delay = policy.next_delay(attempt).unwrap();
            assert!(delay >= previous, "delay decreased at attempt {}", attempt);
            assert!(delay <= Duration::from_secs(30));
            previous = delay;
        }
    }

    #[test]
    fn test_zero_attempts_never_delays() {
        assert_eq!(RetryPolicy::default().next_delay(0), None);
        assert_eq!(RetryPolicy::Fixed(Duration::from_secs(1)).next_delay(0), None);
        assert_eq!(RetryPolicy::None.next_delay(0), None);
    }

    #[test]
    fn test_fixed() {
        let policy = RetryPolicy::Fixed(Duration::from_millis(100));
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(9), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_none() {
        assert_eq!(RetryPolicy::None.next_delay(1), None);
    }

    #[test]
    fn test_from_tuning() {
        let tuning = ConsumerTuning::default();
        let policy = RetryPolicy::from_tuning(&tuning);
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(1)));
    }
}

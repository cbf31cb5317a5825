//! Retry policy for failed publish attempts.

use std::time::Duration;

use rand::Rng;

use crate::error::{PublishError, PublishErrorKind};

/// Exponential backoff with a cap and proportional jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum client invocations per target within one dispatch.
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay.
    pub max_delay: Duration,
    /// Fraction of the delay added at random, 0.0 disables jitter.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter.is_finite() || self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = delay.as_secs_f64() * self.jitter.min(1.0);
        let extra = rand::thread_rng().gen_range(0.0..=spread);
        Duration::try_from_secs_f64(extra)
            .map(|extra| delay.saturating_add(extra))
            .unwrap_or(delay)
    }

    /// Decide whether attempt number `attempt` (1-based) may be followed by another.
    pub fn decide(&self, attempt: u32, error: &PublishError) -> RetryDecision {
        if !error.is_retryable() || attempt >= self.max_retries {
            return RetryDecision::GiveUp;
        }

        let delay = self.with_jitter(self.backoff(attempt));
        let delay = match (error.kind, error.retry_after) {
            (PublishErrorKind::RateLimited, Some(hint)) => delay.max(hint),
            _ => delay,
        };
        RetryDecision::RetryAfter(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter: 0.0,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn test_gives_up_on_terminal_errors() {
        let policy = policy();
        assert_eq!(
            policy.decide(1, &PublishError::rejected("policy violation")),
            RetryDecision::GiveUp
        );
        assert_eq!(
            policy.decide(1, &PublishError::auth_invalid("token revoked")),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_gives_up_when_budget_spent() {
        let policy = policy();
        let err = PublishError::transient("503");
        assert!(matches!(policy.decide(3, &err), RetryDecision::RetryAfter(_)));
        assert_eq!(policy.decide(4, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_rate_limit_hint_is_a_floor() {
        let policy = policy();
        let err = PublishError::rate_limited("slow down", Some(Duration::from_secs(2)));
        assert_eq!(
            policy.decide(1, &err),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy {
            jitter: 0.5,
            ..policy()
        };
        for _ in 0..50 {
            match policy.decide(1, &PublishError::transient("reset")) {
                RetryDecision::RetryAfter(delay) => {
                    assert!(delay >= Duration::from_millis(100));
                    assert!(delay <= Duration::from_millis(150));
                }
                RetryDecision::GiveUp => panic!("expected a retry"),
            }
        }
    }

    #[test]
    fn test_unusable_jitter_never_panics() {
        for jitter in [f64::NAN, f64::INFINITY, -3.0, 1e300] {
            let policy = RetryPolicy { jitter, ..policy() };
            match policy.decide(1, &PublishError::transient("reset")) {
                RetryDecision::RetryAfter(delay) => {
                    assert!(delay >= Duration::from_millis(100));
                    assert!(delay <= Duration::from_millis(200));
                }
                RetryDecision::GiveUp => panic!("expected a retry"),
            }
        }
    }
}

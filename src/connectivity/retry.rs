//! Broker reconnect policy
//!
//! Pure decision logic: how long to wait after the n-th consecutive failure
//! and whether another attempt is allowed at all.

use std::time::Duration;

/// Backoff between failed broker connect attempts
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay after every failure
    Fixed(Duration),
    /// `initial * multiplier^(n-1)`, capped at `max`
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

/// Reconnection policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of connect attempts per round (None = unlimited)
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: Backoff::Fixed(Duration::from_secs(5)),
        }
    }
}

/// Decision result for the next connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Proceed with attempt number `attempt` (1-based)
    Attempt { attempt: u32 },
    /// Bound reached; give up for this round
    GiveUp,
}

impl RetryPolicy {
    /// Decide whether another attempt may follow `failures` consecutive failures
    pub fn decide(&self, failures: u32) -> RetryDecision {
        match self.max_attempts {
            Some(max) if failures >= max => RetryDecision::GiveUp,
            _ => RetryDecision::Attempt {
                attempt: failures + 1,
            },
        }
    }

    /// Delay to wait after the `failures`-th consecutive failure
    pub fn delay_after(&self, failures: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = failures.saturating_sub(1).min(63) as i32;
                let factor = multiplier.powi(exponent);
                let scaled = initial.as_secs_f64() * factor;
                if !scaled.is_finite() || scaled >= max.as_secs_f64() {
                    *max
                } else {
                    // Negative products come from an unvalidated multiplier
                    Duration::try_from_secs_f64(scaled)
                        .map_or(*initial, |delay| delay.max(*initial))
                }
            }
        }
    }

    /// Total delay spent before giving up, None when retries are unlimited
    pub fn max_total_delay(&self) -> Option<Duration> {
        self.max_attempts
            .map(|max| (1..max).map(|n| self.delay_after(n)).sum())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == Some(0) {
            return Err("max_attempts must be greater than 0 or absent for unlimited".to_string());
        }
        match &self.backoff {
            Backoff::Fixed(delay) if delay.is_zero() => {
                Err("retry delay must be greater than 0".to_string())
            }
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                if initial.is_zero() {
                    Err("initial retry delay must be greater than 0".to_string())
                } else if max < initial {
                    Err("max retry delay must not be below the initial delay".to_string())
                } else if !(*multiplier >= 1.0) {
                    Err("backoff multiplier must be at least 1.0".to_string())
                } else {
                    Ok(())
                }
            }
            Backoff::Fixed(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exponential() -> RetryPolicy {
        RetryPolicy {
            max_attempts: Some(6),
            backoff: Backoff::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(10),
                multiplier: 2.0,
            },
        }
    }

    #[test]
    fn test_default_policy_is_unbounded_fixed_five_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, None);
        for failures in [1, 2, 10, 1000] {
            assert_eq!(policy.delay_after(failures), Duration::from_secs(5));
        }
        assert_eq!(policy.decide(u32::MAX - 1), RetryDecision::Attempt { attempt: u32::MAX });
        assert_eq!(policy.max_total_delay(), None);
    }

    #[test]
    fn test_bounded_policy_gives_up() {
        let policy = RetryPolicy {
            max_attempts: Some(3),
            ..Default::default()
        };
        assert_eq!(policy.decide(0), RetryDecision::Attempt { attempt: 1 });
        assert_eq!(policy.decide(2), RetryDecision::Attempt { attempt: 3 });
        assert_eq!(policy.decide(3), RetryDecision::GiveUp);
        assert_eq!(policy.max_total_delay(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_exponential_backoff_caps() {
        let policy = exponential();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
        assert_eq!(policy.delay_after(4), Duration::from_secs(8));
        assert_eq!(policy.delay_after(5), Duration::from_secs(10));
        assert_eq!(policy.delay_after(500), Duration::from_secs(10));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(exponential().validate().is_ok());

        let zero_attempts = RetryPolicy {
            max_attempts: Some(0),
            ..Default::default()
        };
        assert!(zero_attempts.validate().is_err());

        let zero_delay = RetryPolicy {
            max_attempts: None,
            backoff: Backoff::Fixed(Duration::ZERO),
        };
        assert!(zero_delay.validate().is_err());

        let shrinking = RetryPolicy {
            max_attempts: None,
            backoff: Backoff::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(10),
                multiplier: 0.5,
            },
        };
        assert!(shrinking.validate().is_err());
    }

    #[test]
    fn test_negative_multiplier_falls_back_to_initial_delay() {
        let policy = RetryPolicy {
            max_attempts: None,
            backoff: Backoff::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(10),
                multiplier: -2.0,
            },
        };
        assert!(policy.validate().is_err());
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(1));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }
}

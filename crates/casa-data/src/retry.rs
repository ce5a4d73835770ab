//! Retry policies for backend queries.

use std::time::Duration;

use casa_core::QuerySettings;

use crate::error::ErrorClass;

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Fixed delay between retries.
    Fixed(Duration),
    /// `base * (attempt + 1)`.
    Linear {
        /// Step added per attempt.
        base: Duration,
    },
    /// `base * 2^attempt`, capped at `max`.
    Exponential {
        /// Initial delay.
        base: Duration,
        /// Maximum delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Delay to wait after the failed attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => *d,
            Self::Linear { base } => base.saturating_mul(attempt.saturating_add(1)),
            Self::Exponential { base, max } => {
                let multiplier = 2u32.saturating_pow(attempt);
                std::cmp::min(base.saturating_mul(multiplier), *max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Linear {
            base: Duration::from_secs(1),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Create a policy with linear backoff.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::default(),
        }
    }

    /// Create a policy with no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: BackoffStrategy::None,
        }
    }

    /// Build from configuration.
    pub fn from_config(settings: &QuerySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            backoff: BackoffStrategy::Linear {
                base: Duration::from_millis(settings.backoff_base_ms),
            },
        }
    }

    /// Set backoff strategy.
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether a failure of `class` on attempt `attempt` (0-indexed) is
    /// retried.
    pub fn should_retry(&self, class: ErrorClass, attempt: u32) -> bool {
        class.is_retryable() && attempt < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff() {
        let backoff = BackoffStrategy::default();
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_backoff_capped() {
        let backoff = BackoffStrategy::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_millis(500),
        };
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(backoff.delay_for_attempt(40), Duration::from_millis(500));
    }

    #[test]
    fn test_fixed_and_none() {
        assert_eq!(BackoffStrategy::Fixed(Duration::from_millis(250)).delay_for_attempt(5), Duration::from_millis(250));
        assert_eq!(BackoffStrategy::None.delay_for_attempt(5), Duration::ZERO);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::new(2);
        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.should_retry(ErrorClass::Connection, 0));
        assert!(policy.should_retry(ErrorClass::Timeout, 1));
        assert!(!policy.should_retry(ErrorClass::Connection, 2));
        assert!(!policy.should_retry(ErrorClass::Fatal, 0));
        assert!(!RetryPolicy::none().should_retry(ErrorClass::Connection, 0));
    }

    #[test]
    fn test_from_config() {
        let settings = QuerySettings {
            max_retries: 4,
            backoff_base_ms: 250,
            ..QuerySettings::default()
        };
        let policy = RetryPolicy::from_config(&settings);
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.backoff.delay_for_attempt(1), Duration::from_millis(500));
    }
}

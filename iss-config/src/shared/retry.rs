use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Retry policy for transient network operations.
///
/// An operation is attempted at most [`RetryConfig::max_attempts`] times. After the n-th
/// failed attempt (0-based) the caller sleeps `initial_delay * backoff_multiplier^n`, so the
/// defaults produce waits of 1s then 2s between three attempts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    ///
    /// Default: 3
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds.
    ///
    /// Default: 1000ms
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Factor applied to the delay after each failed attempt.
    ///
    /// Must be >= 1.0.
    /// Default: 2.0
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Returns the initial delay as a Duration.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Returns the delay to wait after the failed attempt with the given 0-based index.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);

        // Saturates instead of overflowing for long retry chains.
        Duration::try_from_secs_f64(self.initial_delay().as_secs_f64() * multiplier)
            .unwrap_or(Duration::MAX)
    }

    /// Validates the [`RetryConfig`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::RetryMaxAttemptsZero);
        }

        if self.backoff_multiplier < 1.0 {
            return Err(ValidationError::BackoffMultiplierTooSmall(
                self.backoff_multiplier,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_by_default() {
        let config = RetryConfig::default();

        assert_eq!(config.initial_delay(), Duration::from_secs(1));
        assert_eq!(config.delay_after_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_after_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_after_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn delays_saturate_on_long_chains() {
        let config = RetryConfig::default();

        assert_eq!(config.delay_after_attempt(5_000), Duration::MAX);
    }

    #[test]
    fn zero_attempts_is_invalid() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ValidationError::RetryMaxAttemptsZero)
        ));
    }

    #[test]
    fn shrinking_multiplier_is_invalid() {
        let config = RetryConfig {
            backoff_multiplier: 0.5,
            ..RetryConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ValidationError::BackoffMultiplierTooSmall(_))
        ));
    }
}

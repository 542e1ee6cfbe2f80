use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Maximum retry attempts cannot be zero.
    #[error("`max_attempts` cannot be zero")]
    RetryMaxAttemptsZero,
    /// Backoff multiplier must not shrink delays.
    #[error("`backoff_multiplier` must be >= 1.0, got {0}")]
    BackoffMultiplierTooSmall(f64),
    /// The poll loop must run at least once.
    #[error("`iterations` cannot be zero")]
    PollIterationsZero,
    /// A name used to address a store object is empty.
    #[error("`{0}` cannot be empty")]
    EmptyName(&'static str),
    /// A timeout of zero would fail every call immediately.
    #[error("`{0}` cannot be zero")]
    TimeoutZero(&'static str),
}

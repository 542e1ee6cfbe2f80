use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::{RetryConfig, ValidationError};

/// Configuration of the upstream position API.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Endpoint returning the station's current position as JSON.
    pub url: String,
    /// Per-request timeout in milliseconds.
    ///
    /// Default: 15000ms
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry policy applied to each position fetch.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_timeout_ms() -> u64 {
    15_000
}

impl ApiConfig {
    /// Returns the per-request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates the [`ApiConfig`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_ms == 0 {
            return Err(ValidationError::TimeoutZero("api.timeout_ms"));
        }

        self.retry.validate()
    }
}

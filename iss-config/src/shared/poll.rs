use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration of the fetch-and-store loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    /// Number of fetch-and-store iterations per run.
    ///
    /// Default: 200
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Pause between two iterations, in milliseconds.
    ///
    /// Default: 1000ms
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_iterations() -> u32 {
    200
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl PollConfig {
    /// Returns the pause between iterations as a Duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Validates the [`PollConfig`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.iterations == 0 {
            return Err(ValidationError::PollIterationsZero);
        }

        Ok(())
    }
}

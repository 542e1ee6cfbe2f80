use iss_config::load_config;
use iss_config::shared::{IssConfig, PollConfig};

use crate::error::{ReplicatorError, ReplicatorResult};

/// Loads and validates the tracker configuration.
///
/// Uses the standard configuration loading mechanism from [`iss_config`] and validates the
/// resulting [`IssConfig`] before returning it.
pub fn load_replicator_config() -> ReplicatorResult<IssConfig> {
    let config = load_config::<IssConfig>().map_err(ReplicatorError::config)?;
    config.validate().map_err(ReplicatorError::config)?;

    Ok(config)
}

/// Applies the command line overrides of the poll loop and validates the result.
pub fn apply_poll_overrides(
    config: &mut PollConfig,
    iterations: Option<u32>,
    interval_ms: Option<u64>,
) -> ReplicatorResult<()> {
    if let Some(iterations) = iterations {
        config.iterations = iterations;
    }
    if let Some(interval_ms) = interval_ms {
        config.interval_ms = interval_ms;
    }

    config.validate().map_err(ReplicatorError::config)
}

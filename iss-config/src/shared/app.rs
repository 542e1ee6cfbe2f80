use serde::Deserialize;

use crate::Config;
use crate::shared::{ApiConfig, MongoConfig, PgConnectionConfig, PollConfig, ValidationError};

/// Complete configuration of the tracker.
///
/// Aggregates the upstream API, both stores and the poll loop settings. Built once at
/// startup and handed to each component, so a missing URL surfaces here and never later.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking connection
/// credentials into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct IssConfig {
    /// Upstream position API.
    pub api: ApiConfig,
    /// Document store receiving raw samples.
    pub mongo: MongoConfig,
    /// Relational store receiving replicated readings.
    pub postgres: PgConnectionConfig,
    /// Fetch-and-store loop settings.
    #[serde(default)]
    pub poll: PollConfig,
}

impl IssConfig {
    /// Validates the complete configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.api.validate()?;
        self.mongo.validate()?;
        self.postgres.validate()?;
        self.poll.validate()
    }
}

impl Config for IssConfig {
    const REQUIRED_KEYS: &'static [&'static str] = &["api.url", "mongo.url", "postgres.url"];

    const ENV_ALIASES: &'static [(&'static str, &'static str)] = &[
        ("ISS_api_url", "api.url"),
        ("M_url", "mongo.url"),
        ("Supabase_url", "postgres.url"),
    ];
}

use std::{
    borrow::Cow,
    collections::HashMap,
    fmt, io,
    path::{Path, PathBuf},
};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::{APP_ENVIRONMENT_ENV_NAME, Environment};

/// Directory containing configuration files relative to application root.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for base and environment configuration files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Trait implemented by top-level configuration structures.
pub trait Config {
    /// Dotted keys that must resolve to a non-empty value once every source is merged.
    const REQUIRED_KEYS: &'static [&'static str];

    /// Plain environment variables accepted as aliases for dotted keys, as
    /// `(variable name, key)` pairs. Aliases have the highest precedence.
    const ENV_ALIASES: &'static [(&'static str, &'static str)];
}

/// Identifies which configuration file is currently being loaded.
#[derive(Debug, Clone, Copy)]
enum ConfigFileKind {
    /// Base configuration shared by every environment.
    Base,
    /// Environment-specific overrides (dev/prod).
    Environment(Environment),
}

impl ConfigFileKind {
    fn stem(&self) -> Cow<'static, str> {
        match self {
            ConfigFileKind::Base => Cow::Borrowed("base"),
            ConfigFileKind::Environment(env) => Cow::Owned(env.to_string()),
        }
    }
}

impl fmt::Display for ConfigFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileKind::Base => f.write_str("base configuration"),
            ConfigFileKind::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// A configuration file existed but could not be parsed.
    #[error("failed to load {kind_description} from `{path}`: {source}")]
    ConfigurationFileLoad {
        kind_description: String,
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    /// Environment variable overrides failed to merge into the configuration.
    #[error("failed to load configuration from environment variables: {0}")]
    EnvironmentVariables(#[source] rust_cli_config::ConfigError),

    /// A required value was not provided by any source.
    #[error("missing required configuration value `{key}`; set one of: {env_vars}")]
    MissingValue { key: &'static str, env_vars: String },

    /// The configuration sources were merged but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    /// Failed to determine the runtime environment (`APP_ENVIRONMENT`).
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    /// Failed to initialize the configuration builder.
    #[error("failed to initialize configuration builder: {0}")]
    Builder(#[source] rust_cli_config::ConfigError),
}

/// Loads hierarchical configuration from files and the process environment.
///
/// Reads the optional `configuration/base.(yaml|yml|json)` and
/// `configuration/{environment}.(yaml|yml|json)` files, then applies `APP_`-prefixed
/// environment variables (nested keys use double underscores, e.g. `APP_MONGO__URL`) and
/// finally the plain aliases declared in [`Config::ENV_ALIASES`].
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let vars: HashMap<String, String> = std::env::vars().collect();

    load_config_from(&base_path.join(CONFIGURATION_DIR), vars)
}

/// Loads configuration from an explicit directory and set of environment variables.
///
/// Missing configuration files are skipped, which allows running from environment
/// variables alone. Files that exist but fail to parse are reported.
pub fn load_config_from<T>(
    configuration_directory: &Path,
    vars: HashMap<String, String>,
) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let environment = Environment::from_value(
        vars.get(APP_ENVIRONMENT_ENV_NAME).map(String::as_str),
    )?;

    let mut builder = rust_cli_config::Config::builder();

    for kind in [ConfigFileKind::Base, ConfigFileKind::Environment(environment)] {
        if let Some(path) = find_configuration_file(configuration_directory, kind) {
            builder = builder.add_source(rust_cli_config::File::from(path.clone()));
            validate_configuration_source(&builder, kind, &path)?;
        }
    }

    let aliases: Vec<(&'static str, Option<String>)> = T::ENV_ALIASES
        .iter()
        .map(|(var, key)| (*key, vars.get(*var).cloned()))
        .collect();

    let environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .source(Some(vars));
    builder = builder.add_source(environment_source);

    for (key, value) in aliases {
        builder = builder
            .set_override_option(key, value)
            .map_err(LoadConfigError::EnvironmentVariables)?;
    }

    let settings = builder.build().map_err(LoadConfigError::Builder)?;

    for &key in T::REQUIRED_KEYS {
        let present = settings
            .get_string(key)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false);

        if !present {
            return Err(LoadConfigError::MissingValue {
                key,
                env_vars: env_vars_for_key::<T>(key),
            });
        }
    }

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Lists the environment variables that can provide `key`, prefixed form first.
fn env_vars_for_key<T: Config>(key: &str) -> String {
    let prefixed = format!(
        "`{ENV_PREFIX}{ENV_PREFIX_SEPARATOR}{}`",
        key.replace('.', ENV_SEPARATOR).to_uppercase()
    );

    std::iter::once(prefixed)
        .chain(
            T::ENV_ALIASES
                .iter()
                .filter(|(_, alias_key)| *alias_key == key)
                .map(|(var, _)| format!("`{var}`")),
        )
        .collect::<Vec<_>>()
        .join(", ")
}

/// Finds the configuration file that matches the requested kind and supported extensions.
fn find_configuration_file(directory: &Path, kind: ConfigFileKind) -> Option<PathBuf> {
    let stem = kind.stem();

    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .find(|path| path.is_file())
}

fn validate_configuration_source(
    builder: &ConfigBuilder<DefaultState>,
    kind: ConfigFileKind,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            kind_description: kind.to_string(),
            path: path.to_path_buf(),
            source,
        })
        .map(|_| ())
}

use std::fmt;
use std::io::Error;

/// Environment variable name containing the environment identifier.
pub const APP_ENVIRONMENT_ENV_NAME: &str = "APP_ENVIRONMENT";

/// Production environment identifier.
const PROD_ENV_NAME: &str = "prod";

/// Development environment identifier.
const DEV_ENV_NAME: &str = "dev";

/// Runtime environment for the application.
///
/// Selects which environment configuration file is layered on top of the base one and
/// whether logs go to the terminal or to rolling files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Production environment.
    Prod,
    /// Development environment.
    Dev,
}

impl Environment {
    /// Loads the environment from the `APP_ENVIRONMENT` environment variable.
    ///
    /// Defaults to [`Environment::Dev`] if the variable is not set, since the tracker is
    /// mostly run by hand from a terminal.
    pub fn load() -> Result<Environment, Error> {
        Self::from_value(std::env::var(APP_ENVIRONMENT_ENV_NAME).ok().as_deref())
    }

    /// Resolves the environment from an optional raw value, falling back to development.
    pub fn from_value(value: Option<&str>) -> Result<Environment, Error> {
        value.unwrap_or(DEV_ENV_NAME).to_owned().try_into()
    }

    /// Sets the `APP_ENVIRONMENT` environment variable to this environment's value.
    pub fn set(&self) {
        unsafe { std::env::set_var(APP_ENVIRONMENT_ENV_NAME, self.to_string()) }
    }

    /// Returns whether this is the production environment.
    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Environment::Prod => write!(f, "{PROD_ENV_NAME}"),
            Environment::Dev => write!(f, "{DEV_ENV_NAME}"),
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = Error;

    /// Attempts to create an [`Environment`] from a string, case-insensitively.
    ///
    /// Accepts "dev" or "prod". Returns an error if the input does not match a supported environment.
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            DEV_ENV_NAME => Ok(Self::Dev),
            PROD_ENV_NAME => Ok(Self::Prod),
            other => Err(Error::other(format!(
                "{other} is not a supported environment. Use either `{DEV_ENV_NAME}` or `{PROD_ENV_NAME}`.",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_value_defaults_to_dev() {
        assert_eq!(Environment::from_value(None).unwrap(), Environment::Dev);
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(
            Environment::from_value(Some("PROD")).unwrap(),
            Environment::Prod
        );
        assert!(Environment::from_value(Some("staging")).is_err());
    }
}

//! Environment variable and secret file lookup
//!
//! A value is resolved from, in order:
//! 1. the environment variable,
//! 2. the secret file (when a secret name is given),
//! 3. the default.
//!
//! ```
//! use nwa_config::get_config;
//!
//! let port: u16 = get_config("NWA_DOC_EXAMPLE_PORT").default(8080).resolve().unwrap();
//! assert_eq!(port, 8080);
//! ```

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default location of mounted secrets
pub const DEFAULT_SECRET_LOCATION: &str = "/run/secrets";

/// A failed lookup of a single variable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing config for {0}")]
    Missing(String),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: String, value: String },

    #[error("Unexpected Error while reading file {path}: {error}")]
    UnreadableSecret { path: String, error: String },
}

type Parser<T> = Arc<dyn Fn(&str) -> Result<T, String> + Send + Sync>;

/// Builder for a single configuration lookup
#[derive(Clone)]
pub struct ConfigLookup<T> {
    var: String,
    default: Option<T>,
    parse: Parser<T>,
    secret: Option<String>,
    secret_base_location: PathBuf,
}

/// Start a lookup of `var`, parsed with `FromStr`.
pub fn get_config<T>(var: impl Into<String>) -> ConfigLookup<T>
where
    T: FromStr,
    T::Err: Display,
{
    ConfigLookup {
        var: var.into(),
        default: None,
        parse: Arc::new(|raw: &str| raw.parse::<T>().map_err(|e| e.to_string())),
        secret: None,
        secret_base_location: PathBuf::from(DEFAULT_SECRET_LOCATION),
    }
}

impl<T> ConfigLookup<T> {
    /// Value to use when neither the environment nor a secret provides one
    pub fn default(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    /// Replace the `FromStr` parser
    pub fn parse_with<F, E>(mut self, parse: F) -> Self
    where
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Display,
    {
        self.parse = Arc::new(move |raw: &str| parse(raw).map_err(|e| e.to_string()));
        self
    }

    /// Name of the secret file holding the value
    pub fn secret(mut self, name: impl Into<String>) -> Self {
        self.secret = Some(name.into());
        self
    }

    /// Directory containing secret files
    pub fn secret_base_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.secret_base_location = path.into();
        self
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    fn parse_value(&self, raw: &str) -> Result<T, ConfigError> {
        (self.parse)(raw).map_err(|_| ConfigError::Invalid {
            var: self.var.clone(),
            value: raw.to_string(),
        })
    }
}

impl<T: Clone> ConfigLookup<T> {
    fn default_or_missing(&self) -> Result<T, ConfigError> {
        self.default
            .clone()
            .ok_or_else(|| ConfigError::Missing(self.var.clone()))
    }

    /// Resolve the value
    pub fn resolve(&self) -> Result<T, ConfigError> {
        if let Ok(raw) = std::env::var(&self.var) {
            return self.parse_value(&raw);
        }

        let Some(secret) = &self.secret else {
            return self.default_or_missing();
        };

        let path = self.secret_base_location.join(secret);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let content = content.trim();
                if content.is_empty() {
                    self.default_or_missing()
                } else {
                    self.parse_value(content)
                }
            }
            Err(_) if self.default.is_some() => self.default_or_missing(),
            Err(e) => Err(ConfigError::UnreadableSecret {
                path: path.display().to_string(),
                error: e.to_string(),
            }),
        }
    }
}

/// All configuration errors found while resolving a set of values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", join_errors(.0))]
pub struct InvalidConfig(pub Vec<ConfigError>);

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collects lookup results so all problems are reported at once.
///
/// ```
/// use nwa_config::{ConfigErrors, get_config};
///
/// let mut errors = ConfigErrors::new();
/// let host = errors.check(get_config::<String>("NWA_DOC_HOST").default("localhost".into()).resolve());
/// let port = errors.check(get_config::<u16>("NWA_DOC_PORT").default(80).resolve());
/// errors.finish().unwrap();
///
/// assert_eq!(host.as_deref(), Some("localhost"));
/// assert_eq!(port, Some(80));
/// ```
#[derive(Debug, Default)]
pub struct ConfigErrors {
    errors: Vec<ConfigError>,
}

impl ConfigErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the error of `result`, if any, and return the value otherwise
    pub fn check<T>(&mut self, result: Result<T, ConfigError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fail with every recorded error
    pub fn finish(self) -> Result<(), InvalidConfig> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(InvalidConfig(self.errors))
        }
    }
}

//! Logging bootstrap
//!
//! Installs a global `tracing` subscriber writing to stdout in one of three
//! formats:
//!
//! | `LOG_OUTPUT` | Format                                  |
//! |--------------|-----------------------------------------|
//! | `plain`      | human readable, no ANSI colors          |
//! | `colored`    | human readable with ANSI colors (default) |
//! | `json`       | one JSON object per event               |
//!
//! The base level comes from `LOG_LEVEL` (default `DEBUG`). Extra per-target
//! levels can be added with [`LoggingConfig::with_logger`]. When `RUST_LOG`
//! is set it takes precedence over both.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Output format of the log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogOutput {
    Plain,
    #[default]
    Colored,
    Json,
}

impl FromStr for LogOutput {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(LogOutput::Plain),
            "colored" => Ok(LogOutput::Colored),
            "json" => Ok(LogOutput::Json),
            other => Err(LoggingError::InvalidOutput(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Unknown log output format: {0}")]
    InvalidOutput(String),

    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Failed to initialize logging: {0}")]
    Init(#[from] TryInitError),
}

/// Parse a level name. Accepts the usual aliases `WARNING`, `CRITICAL` and
/// `FATAL` next to the `tracing` level names.
pub fn parse_level(value: &str) -> Option<Level> {
    match value.trim().to_ascii_uppercase().as_str() {
        "WARNING" => Some(Level::WARN),
        "CRITICAL" | "FATAL" => Some(Level::ERROR),
        other => other.parse().ok(),
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Base log level
    pub level: Level,
    /// Output format
    pub output: LogOutput,
    /// Additional per-target levels
    pub loggers: Vec<(String, Level)>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            output: LogOutput::Colored,
            loggers: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Create from `LOG_LEVEL` and `LOG_OUTPUT`. Unknown values fall back to
    /// the defaults.
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("LOG_LEVEL").ok().as_deref(),
            std::env::var("LOG_OUTPUT").ok().as_deref(),
        )
    }

    pub fn from_values(level: Option<&str>, output: Option<&str>) -> Self {
        let defaults = Self::default();
        Self {
            level: level.and_then(parse_level).unwrap_or(defaults.level),
            output: output
                .and_then(|o| o.parse().ok())
                .unwrap_or(defaults.output),
            loggers: Vec::new(),
        }
    }

    /// Set the level for events whose target starts with `target`
    pub fn with_logger(mut self, target: impl Into<String>, level: Level) -> Self {
        self.loggers.push((target.into(), level));
        self
    }

    /// Filter directives in `EnvFilter` syntax, e.g. `debug,hyper=info`
    pub fn directives(&self) -> String {
        let mut directives = vec![self.level.to_string().to_lowercase()];
        directives.extend(
            self.loggers
                .iter()
                .map(|(target, level)| format!("{}={}", target, level.to_string().to_lowercase())),
        );
        directives.join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return EnvFilter::try_from_default_env()
                .map_err(|e| LoggingError::InvalidFilter(e.to_string()));
        }
        EnvFilter::try_new(self.directives()).map_err(|e| LoggingError::InvalidFilter(e.to_string()))
    }
}

/// Install the global subscriber.
///
/// Fails instead of panicking when a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = config.env_filter()?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.output {
        LogOutput::Plain => fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
        LogOutput::Colored => fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .with_filter(filter)
            .boxed(),
        LogOutput::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_filter(filter)
            .boxed(),
    };

    Registry::default().with(layer).try_init()?;

    tracing::debug!(
        level = %config.level,
        output = ?config.output,
        loggers = config.loggers.len(),
        "Logging initialized"
    );
    Ok(())
}

//! NWA Config - configuration and process bootstrap
//!
//! - `config`: environment variable / secret file lookup
//! - `settings`: library wide settings loaded from the environment
//! - `logging`: global tracing subscriber setup
//! - `version`: crate version and git commit hash

pub mod config;
pub mod logging;
pub mod settings;
pub mod version;

pub use crate::config::{ConfigError, ConfigErrors, ConfigLookup, InvalidConfig, get_config};
pub use logging::{LogOutput, LoggingConfig, LoggingError, init_logging};
pub use settings::{DebuggerRequest, NwaSettings, debugger_request, nwa_settings};
pub use version::{VERSION, git_commit_hash};

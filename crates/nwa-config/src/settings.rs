//! Common settings for services depending on the NWA crates

use std::collections::HashMap;
use std::sync::LazyLock;

use ::config::{Config, Environment};
use serde::Deserialize;

/// Settings read from the process environment (`DEBUG`, `DEBUG_VSCODE`,
/// `DEBUG_PYCHARM`). Values such as `true`, `1` or `on` enable a flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NwaSettings {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub debug_vscode: bool,
    #[serde(default)]
    pub debug_pycharm: bool,
}

impl NwaSettings {
    /// Load the settings from the process environment
    pub fn from_env() -> Result<Self, ::config::ConfigError> {
        Self::load(None)
    }

    /// Load the settings from an explicit set of variables
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ::config::ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Some(vars))
    }

    fn load(source: Option<HashMap<String, String>>) -> Result<Self, ::config::ConfigError> {
        Config::builder()
            .add_source(Environment::default().try_parsing(true).source(source))
            .build()?
            .try_deserialize()
    }
}

static NWA_SETTINGS: LazyLock<NwaSettings> = LazyLock::new(|| {
    NwaSettings::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Invalid NWA settings in environment, using defaults");
        NwaSettings::default()
    })
});

/// Process wide settings, loaded on first access
pub fn nwa_settings() -> &'static NwaSettings {
    &NWA_SETTINGS
}

/// An IDE debugger that was asked for through the settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerRequest {
    VsCode { host: &'static str, port: u16 },
    PyCharm { host: &'static str, port: u16 },
}

/// Report which debugger the settings ask for.
///
/// Attaching is left to the caller; this only logs and returns the request.
pub fn debugger_request(settings: &NwaSettings) -> Option<DebuggerRequest> {
    let request = if settings.debug_vscode {
        Some(DebuggerRequest::VsCode {
            host: "127.0.0.1",
            port: 5678,
        })
    } else if settings.debug_pycharm {
        Some(DebuggerRequest::PyCharm {
            host: "127.0.0.1",
            port: 12345,
        })
    } else {
        None
    };

    match request {
        Some(request) => tracing::info!(?request, "Debugger requested"),
        None => tracing::info!("No debugger configured"),
    }
    request
}

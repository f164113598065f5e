//! Relay configuration, loaded from TOML.
//!
//! ```toml
//! default_context = "thread_pool"
//! log_filter = "relay_core=debug"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::domain::{ExecutionContext, RelayError};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// Context used by `Relay::launch` when none is given.
    #[serde(default)]
    pub default_context: ExecutionContext,

    /// `tracing_subscriber::EnvFilter` directive for binaries.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "relay_core=info".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_context: ExecutionContext::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl RelayConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, RelayError> {
        toml::from_str(text).map_err(|e| RelayError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

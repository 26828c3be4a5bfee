//! Tool settings with environment overrides.
//!
//! Loaded from:
//! 1. Default values
//! 2. Environment variables with `DIFY_PLUGIN_` prefix
//!    (e.g. `DIFY_PLUGIN_TRANSFER_TIMEOUT_SECS=120`)
//!
//! Console credentials are not part of these settings; they live in the
//! credential file (see [`crate::credentials`]).

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "DIFY_PLUGIN";

/// Port the plugin daemon listens on for remote debugging sessions
pub const DEFAULT_REMOTE_INSTALL_PORT: u16 = 5003;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Timeout for lightweight calls (login, debugging key, installation lookup)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout for calls that move packages or wait on the plugin daemon
    /// (upload, uninstall, install)
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_secs: u64,
    /// Port advertised in the generated `.env` block
    #[serde(default = "default_remote_install_port")]
    pub remote_install_port: u16,
    /// Credential file used by the installer instead of searching from the
    /// working directory
    #[serde(default)]
    pub credential_file: Option<PathBuf>,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_transfer_timeout() -> u64 {
    60
}

fn default_remote_install_port() -> u16 {
    DEFAULT_REMOTE_INSTALL_PORT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            transfer_timeout_secs: default_transfer_timeout(),
            remote_install_port: default_remote_install_port(),
            credential_file: None,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }
}

/// Load settings from defaults and the process environment
pub fn load_settings() -> Result<Settings, ConfigError> {
    settings_from_env(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
}

/// Build settings from defaults plus the given environment source
pub fn settings_from_env(env: Environment) -> Result<Settings, ConfigError> {
    Config::builder()
        .set_default("request_timeout_secs", default_request_timeout() as i64)?
        .set_default("transfer_timeout_secs", default_transfer_timeout() as i64)?
        .set_default("remote_install_port", i64::from(default_remote_install_port()))?
        .add_source(env)
        .build()?
        .try_deserialize()
}

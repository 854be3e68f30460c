//! `load_config` module: builds the run [`Config`] from the environment and an optional YAML settings file.
//!
//! Secrets never live in the YAML file. The four identity variables (`TENANT_ID`, `CLIENT_ID`,
//! `CLIENT_SECRET`, `MS_SP_ID`) come from the environment, which the binary first populates
//! from `.env` when one is present. The YAML file only tunes behaviour; every key is optional:
//!
//! ```yaml
//! output_dir: ./data
//! http_timeout_secs: 30
//! token_refresh_margin_secs: 60
//! page_size: 200
//! skip_existing: false
//! retry:
//!   max_attempts: 3
//!   base_delay_ms: 1000
//!   max_delay_ms: 30000
//! ```
//!
//! # Errors
//! All failures are [`ConfigError`]s and are raised before any network call.

use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::config::{Config, Credentials, Settings};
use crate::error::ConfigError;

/// Loads settings from `path` (or defaults) and credentials from the process environment.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit variable lookup.
pub fn load_config_with<P, F>(path: Option<P>, lookup: F) -> Result<Config, ConfigError>
where
    P: AsRef<Path>,
    F: Fn(&str) -> Option<String>,
{
    let settings = match path {
        Some(path) => load_settings(path)?,
        None => {
            info!("No settings file given, using defaults");
            Settings::default()
        }
    };
    settings.validate()?;

    let credentials = Credentials::from_lookup(lookup).map_err(|e| {
        error!(error = %e, "Credentials missing from environment");
        e
    })?;

    let config = Config {
        credentials,
        settings,
    };
    config.trace_loaded();
    Ok(config)
}

/// Parses a YAML settings file; absent keys take their defaults.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading settings from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        ConfigError::Read {
            path: path_ref.display().to_string(),
            reason: e.to_string(),
        }
    })?;

    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    serde_yaml::from_str::<Settings>(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        ConfigError::Parse(e.to_string())
    })
}

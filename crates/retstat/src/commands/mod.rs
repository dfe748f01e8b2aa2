//! Subcommand handlers.

pub mod catalog;
pub mod once;
pub mod run;

use std::time::Duration;

use retstat_config::{ConfigError, config_path, load_config};
use retstat_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a command needs from the config file.
pub struct Settings {
    pub sessions: Vec<SessionConfig>,
    pub period: Duration,
}

/// Load, validate, and translate the configuration.
pub fn load_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);
    let wrap = |e: ConfigError| CliError::config(path.display().to_string(), e);

    let config = load_config(global.config.as_deref()).map_err(wrap)?;
    Ok(Settings {
        sessions: config.session_configs().map_err(wrap)?,
        period: config.period().map_err(wrap)?,
    })
}

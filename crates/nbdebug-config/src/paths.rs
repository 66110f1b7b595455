//! Default locations for config and log files.

use std::path::PathBuf;

use crate::error::ConfigError;

const APP_DIR: &str = "nbdebug";

fn home_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
        .ok_or(ConfigError::NoHomeDir)
}

/// Global config directory (`~/.config/nbdebug`).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(".config").join(APP_DIR))
}

/// Data directory (`~/.local/share/nbdebug`).
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(".local").join("share").join(APP_DIR))
}

/// Log file used when `[log] file` is unset.
///
/// Falls back to the system temp directory when there is no home.
pub fn default_log_file() -> PathBuf {
    data_dir()
        .unwrap_or_else(|_| std::env::temp_dir().join(APP_DIR))
        .join("nbdebug.log")
}

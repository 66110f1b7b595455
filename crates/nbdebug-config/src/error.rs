use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating, reading, merging or validating config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The file being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Writing the commented template for a first run failed.
    #[error("failed to create default config: {0}")]
    CreateDefault(String),

    /// TOML parsing or (de)serialization failed.
    #[error("TOML parse error: {0}")]
    Parse(String),

    /// A config value failed validation.
    #[error("validation error: {field}: {message}")]
    Validation {
        /// Dotted field path such as `backend.address`.
        field: String,
        /// What is wrong with the value.
        message: String,
    },

    /// No home directory to derive default paths from.
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

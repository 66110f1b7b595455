use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Per-request traffic.
    Debug,
    /// Lifecycle transitions (default).
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// The `tracing` filter directive for this level.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Where the debug backend listens and how the link is buffered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// `host:port` of the backend's debug socket.
    #[serde(default = "default_address")]
    pub address: String,
    /// Buffered messages per direction (at least 1).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_address() -> String {
    "127.0.0.1:5678".to_string()
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Handshake parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Working directory sent with `attach`.
    #[serde(default = "default_cwd")]
    pub cwd: String,
    /// Restrict stepping to user code.
    #[serde(default)]
    pub just_my_code: bool,
    /// Cell replaced by `updateCell`.
    #[serde(default)]
    pub cell_id: i64,
    /// Id the cell takes after `updateCell`.
    #[serde(default = "default_next_id")]
    pub next_id: i64,
    /// Adapter id announced in `initialize`.
    #[serde(default = "default_adapter_id")]
    pub adapter_id: String,
}

fn default_cwd() -> String {
    "/tmp/".to_string()
}

fn default_next_id() -> i64 {
    1
}

fn default_adapter_id() -> String {
    "python".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cwd: default_cwd(),
            just_my_code: false,
            cell_id: 0,
            next_id: default_next_id(),
            adapter_id: default_adapter_id(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log verbosity level.
    #[serde(default)]
    pub level: LogLevel,
    /// Optional path to a log file.
    pub file: Option<PathBuf>,
}

/// Top-level nbdebug configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Handshake parameters.
    #[serde(default)]
    pub session: SessionConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

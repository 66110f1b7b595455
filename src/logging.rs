//! Log file setup for the console.
//!
//! Tracing output goes to a file so it never interleaves with the
//! interactive console on stdout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use nbdebug_config::Config;

/// Maximum size of a single log file before rotation (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum number of rotated log files to retain.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// Install the global subscriber according to `config.log`.
///
/// Returns the path being written to.
pub fn init_logging(config: &Config) -> Result<PathBuf> {
    let log_path = config
        .log
        .file
        .clone()
        .unwrap_or_else(nbdebug_config::paths::default_log_file);

    ensure_log_dir(&log_path)
        .with_context(|| format!("failed to create log directory for {}", log_path.display()))?;
    if let Err(e) = rotate_log_files(&log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES) {
        // Keep appending to the oversized file rather than losing logs.
        eprintln!("nbdebug: log rotation failed: {e}");
    }

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let level = config.log.level.as_filter();
    let env_filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_env_filter(env_filter)
        .init();

    tracing::info!("nbdebug starting, log level: {level}");
    Ok(log_path)
}

/// Ensure the parent directory of a log file exists.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Rotate `log_path` once it reaches `max_size` bytes.
///
/// `nbdebug.log` becomes `nbdebug.log.1`, each `.N` moves to `.N+1`, and
/// `.max_files` is deleted. Missing or small files are left alone.
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size < max_size || max_files == 0 {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for index in (1..max_files).rev() {
        let from = rotated_path(log_path, index);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, index + 1))?;
        }
    }
    fs::rename(log_path, rotated_path(log_path, 1))
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

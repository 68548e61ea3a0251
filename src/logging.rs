//! Centralized logging infrastructure for FramePump
//!
//! This module provides:
//! - Structured logging with tracing
//! - Configurable log levels (Off, Error, Warn, Info, Debug, Trace)
//! - Optional daily log rotation to a file
//! - Cross-platform log file locations
//!
//! The capture service logs through `tracing` whether or not a subscriber is
//! installed; calling [`init_logging`] is up to the embedding application.

use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::thread::JoinHandle;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::config;
use crate::settings::ServiceSettings;

lazy_static! {
    // Global handle for reloading log level dynamically
    static ref LOG_RELOAD_HANDLE: Mutex<Option<Handle<EnvFilter, Registry>>> = Mutex::new(None);
}

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(LogLevel::Off),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            LogLevel::Off => "Off",
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
        };
        write!(f, "{}", value)
    }
}

impl From<LogLevel> for Option<Level> {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Filter directive string for a log level
pub fn filter_directive(log_level: LogLevel) -> String {
    let level: Option<Level> = log_level.into();
    match level {
        Some(lvl) => format!("framepump={}", lvl.as_str().to_lowercase()),
        None => "off".to_string(),
    }
}

/// Get the platform-specific logs directory
pub fn get_logs_dir() -> Result<PathBuf> {
    let app_dir = config::logging::APP_DIR_NAME;
    let logs_dir = if cfg!(target_os = "macos") {
        // macOS: ~/Library/Logs/FramePump
        dirs::home_dir()
            .context("Failed to get home directory")?
            .join("Library")
            .join("Logs")
            .join(app_dir)
    } else {
        // Windows: %LOCALAPPDATA%\FramePump\logs
        // Linux: ~/.local/share/FramePump/logs
        dirs::data_local_dir()
            .context("Failed to get local data directory")?
            .join(app_dir)
            .join("logs")
    };

    // Create directory if it doesn't exist
    if !logs_dir.exists() {
        fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;
    }

    Ok(logs_dir)
}

/// Initialize the logging system
///
/// # Arguments
/// * `log_level` - The minimum log level to record
/// * `log_to_file` - Whether to write logs to file
///
/// Calling this again only reloads the level filter; the file layer is decided
/// by the first call.
pub fn init_logging(log_level: LogLevel, log_to_file: bool) -> Result<()> {
    let level_filter = EnvFilter::new(filter_directive(log_level));

    let mut handle_guard = LOG_RELOAD_HANDLE
        .lock()
        .map_err(|_| anyhow!("Log reload handle lock poisoned"))?;
    if let Some(handle) = handle_guard.as_ref() {
        // Logging already initialized, just reload the filter
        handle.reload(level_filter).context("Failed to reload log filter")?;
        return Ok(());
    }

    let (filter_layer, reload_handle) = tracing_subscriber::reload::Layer::new(level_filter);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    if log_to_file {
        let logs_dir = get_logs_dir()?;
        let appender =
            RollingFileAppender::new(Rotation::DAILY, &logs_dir, config::logging::LOG_FILE_NAME);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(appender)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(false)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(file_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
    }

    *handle_guard = Some(reload_handle);
    Ok(())
}

/// Clean up old log files
///
/// # Arguments
/// * `logs_dir` - Directory containing log files
/// * `keep_days` - Number of days to keep (files older than this will be deleted)
///
/// # Returns
/// * Number of files deleted
pub fn cleanup_old_logs(logs_dir: &Path, keep_days: u32) -> Result<usize> {
    let now = std::time::SystemTime::now();
    let keep_duration = std::time::Duration::from_secs(keep_days as u64 * 24 * 60 * 60);

    let mut deleted_count = 0;

    for entry in fs::read_dir(logs_dir)
        .with_context(|| format!("Failed to read logs directory: {:?}", logs_dir))?
    {
        let entry = entry?;
        let path = entry.path();

        // Rolling files are named framepump.log.YYYY-MM-DD
        let is_log = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|name| name.starts_with(config::logging::LOG_FILE_NAME) || name.ends_with(".log"))
            .unwrap_or(false);
        if !path.is_file() || !is_log {
            continue;
        }

        let metadata = entry.metadata()?;
        if let Ok(modified) = metadata.modified() {
            if let Ok(age) = now.duration_since(modified) {
                if age > keep_duration && fs::remove_file(&path).is_ok() {
                    deleted_count += 1;
                    tracing::debug!(file = ?path, age_days = age.as_secs() / 86400, "Deleted old log file");
                }
            }
        }
    }

    Ok(deleted_count)
}

/// Auto-cleanup old logs (runs in background)
pub fn auto_cleanup_old_logs(keep_days: u32) -> JoinHandle<()> {
    std::thread::spawn(move || {
        if let Ok(logs_dir) = get_logs_dir() {
            match cleanup_old_logs(&logs_dir, keep_days) {
                Ok(count) if count > 0 => {
                    tracing::info!(deleted_count = count, "Cleaned up old log files");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup old log files");
                }
                _ => {}
            }
        }
    })
}

/// Initialize logging from settings and prune old log files when file
/// logging is enabled.
///
/// # Returns
/// * Handle of the background cleanup thread, if one was started
pub fn init_from_settings(settings: &ServiceSettings) -> Result<Option<JoinHandle<()>>> {
    let log_level = settings.log_level();
    init_logging(log_level, settings.log_to_file)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        log_level = %log_level,
        log_to_file = settings.log_to_file,
        "Logging initialized"
    );

    if settings.log_to_file {
        return Ok(Some(auto_cleanup_old_logs(settings.log_retention_days)));
    }
    Ok(None)
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::logging::LogLevel;

/// Persisted service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Delay between captures in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Minimum log level ("off", "error", "warn", "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Also write logs to a daily rotating file
    #[serde(default)]
    pub log_to_file: bool,
    /// Log files older than this many days are deleted when file logging starts
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

fn default_interval_ms() -> u64 {
    config::capture::DEFAULT_INTERVAL_MS
}

fn default_log_level() -> String {
    config::logging::DEFAULT_LOG_LEVEL.to_string()
}

fn default_log_retention_days() -> u32 {
    config::logging::LOG_RETENTION_DAYS
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            log_level: default_log_level(),
            log_to_file: false,
            log_retention_days: default_log_retention_days(),
        }
    }
}

impl ServiceSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Parsed log level; unknown values fall back to `Info`
    pub fn log_level(&self) -> LogLevel {
        self.log_level.parse().unwrap_or_else(|e| {
            log::warn!("{} (using Info)", e);
            LogLevel::Info
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let settings: ServiceSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, ServiceSettings::default());
        assert_eq!(settings.interval(), Duration::from_millis(100));
        assert_eq!(settings.log_retention_days, 30);
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let settings = ServiceSettings {
            log_level: "loud".to_string(),
            ..ServiceSettings::default()
        };
        assert_eq!(settings.log_level(), LogLevel::Info);
    }
}

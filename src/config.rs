//! Service Configuration Constants
//!
//! Centralized configuration for default timings, pixel layout, and environment
//! variable names.

/// Capture Service Configuration
pub mod capture {
    /// Default delay between captures (milliseconds)
    pub const DEFAULT_INTERVAL_MS: u64 = 100;

    /// Bytes per RGBA pixel
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Name given to the background capture thread
    pub const THREAD_NAME: &str = "framepump-capture";
}

/// Logging Configuration
pub mod logging {
    /// Application directory name used for log storage
    pub const APP_DIR_NAME: &str = "FramePump";

    /// File name prefix for rolling log files
    pub const LOG_FILE_NAME: &str = "framepump.log";

    /// Log retention period in days
    pub const LOG_RETENTION_DAYS: u32 = 30;

    /// Default log level when none is configured
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

/// Environment Overrides
pub mod env {
    /// Overrides the capture interval in milliseconds:
    /// - Windows: `set FRAMEPUMP_INTERVAL_MS=50`
    /// - macOS/Linux: `export FRAMEPUMP_INTERVAL_MS=50`
    pub const INTERVAL_ENV: &str = "FRAMEPUMP_INTERVAL_MS";

    /// Overrides the log level (`off`, `error`, `warn`, `info`, `debug`, `trace`)
    pub const LOG_LEVEL_ENV: &str = "FRAMEPUMP_LOG";
}

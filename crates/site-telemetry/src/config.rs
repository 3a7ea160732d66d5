//! Telemetry configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Configuration for console output and the rotated log sinks.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup record
    pub service_name: String,

    /// Root log directory; sinks live under `<log_dir>/api/`
    pub log_dir: PathBuf,

    /// Log level filter for console and terminal sink (trace, debug, info, warn, error)
    pub log_level: String,

    /// Number of hourly files each sink keeps before pruning the oldest
    pub backup_count: usize,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether console output is JSON formatted
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "site-admin-api".to_string(),
            log_dir: PathBuf::from("logs"),
            log_level: "info".to_string(),
            backup_count: 24_000,
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SITE_LOG_DIR`: Root log directory (default: logs)
    /// - `SITE_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `SITE_LOG_BACKUP_COUNT`: Hourly files kept per sink (default: 24000)
    /// - `SITE_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `SITE_JSON_LOGS`: JSON console output (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            service_name: defaults.service_name,

            log_dir: env::var("SITE_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),

            log_level: env::var("SITE_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            backup_count: env::var("SITE_LOG_BACKUP_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|count| *count > 0)
                .unwrap_or(defaults.backup_count),

            console_output: env::var("SITE_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("SITE_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Replace the log directory, keeping everything else.
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }
}

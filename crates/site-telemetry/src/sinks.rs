//! Hourly-rotated structured log sinks.
//!
//! Each sink is a directory `<log_dir>/api/logger_<name>/` holding files
//! named `logger_<name>.<YYYY-MM-DD-HH>.log`. Records are JSON lines. The
//! oldest files are pruned once a sink holds more than `backup_count` files.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::{TelemetryConfig, TelemetryError};

/// Target for request/response content records.
pub const CONTENT_TARGET: &str = "content";

/// Target for per-request timing records.
pub const PERFORMANCE_TARGET: &str = "performance";

/// Target for rejected requests and fault diagnostics.
pub const ERROR_TARGET: &str = "request_error";

/// The structured sinks written by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogSink {
    /// Inbound requests and outbound envelopes
    Content,
    /// Path, client address and handling time
    Performance,
    /// Rejections and fault tracebacks
    Error,
    /// Everything, mirrors the console
    Terminal,
}

impl LogSink {
    /// All sinks in creation order.
    pub const ALL: [LogSink; 4] = [
        LogSink::Content,
        LogSink::Performance,
        LogSink::Error,
        LogSink::Terminal,
    ];

    /// File and directory base name.
    pub const fn name(&self) -> &'static str {
        match self {
            LogSink::Content => "logger_content",
            LogSink::Performance => "logger_performance",
            LogSink::Error => "logger_error",
            LogSink::Terminal => "logger_terminal",
        }
    }

    /// Tracing target routed to this sink; `None` means all targets.
    pub const fn target(&self) -> Option<&'static str> {
        match self {
            LogSink::Content => Some(CONTENT_TARGET),
            LogSink::Performance => Some(PERFORMANCE_TARGET),
            LogSink::Error => Some(ERROR_TARGET),
            LogSink::Terminal => None,
        }
    }

    /// Directory holding this sink's rotated files.
    pub fn directory(&self, log_dir: &Path) -> PathBuf {
        log_dir.join("api").join(self.name())
    }
}

/// Open a sink's rolling appender behind a non-blocking writer.
///
/// The returned guard must be kept alive; dropping it flushes the buffer.
pub fn open_sink(
    sink: LogSink,
    config: &TelemetryConfig,
) -> Result<(NonBlocking, WorkerGuard), TelemetryError> {
    let directory = sink.directory(&config.log_dir);
    std::fs::create_dir_all(&directory).map_err(|e| TelemetryError::SinkInit {
        sink: sink.name(),
        reason: e.to_string(),
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(sink.name())
        .filename_suffix("log")
        .max_log_files(config.backup_count.max(1))
        .build(&directory)
        .map_err(|e| TelemetryError::SinkInit {
            sink: sink.name(),
            reason: e.to_string(),
        })?;

    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_layout() {
        let root = Path::new("/srv/logs");
        assert_eq!(
            LogSink::Content.directory(root),
            PathBuf::from("/srv/logs/api/logger_content")
        );
        assert_eq!(LogSink::Error.target(), Some("request_error"));
        assert_eq!(LogSink::Terminal.target(), None);
    }

    #[test]
    fn test_open_sink_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = TelemetryConfig::default().with_log_dir(dir.path());

        for sink in LogSink::ALL {
            let (_writer, _guard) = open_sink(sink, &config).unwrap();
            assert!(sink.directory(dir.path()).is_dir());
        }
    }
}

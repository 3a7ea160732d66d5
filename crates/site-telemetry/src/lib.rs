//! # Site Telemetry
//!
//! Logging bootstrap for the site admin API.
//!
//! ## Sinks
//!
//! | Sink | Target | Contents |
//! |------|--------|----------|
//! | `logger_content` | `content` | inbound requests and outbound envelopes |
//! | `logger_performance` | `performance` | path, client address, handling time |
//! | `logger_error` | `request_error` | rejected requests, fault tracebacks |
//! | `logger_terminal` | all | mirror of the console |
//!
//! Every sink is an hourly-rotated JSON-lines file with bounded retention.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use site_telemetry::{init_telemetry, TelemetryConfig, CONTENT_TARGET};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! tracing::info!(target: CONTENT_TARGET, request_id = 7, "request_in");
//! ```

mod config;
mod sinks;

pub use config::TelemetryConfig;
pub use sinks::{open_sink, LogSink, CONTENT_TARGET, ERROR_TARGET, PERFORMANCE_TARGET};

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("failed to open log sink {sink}: {reason}")]
    SinkInit { sink: &'static str, reason: String },

    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("failed to install subscriber: {0}")]
    SubscriberInit(String),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber: console output plus the four rotated sinks.
///
/// Returns a guard that must be held for the lifetime of the application.
/// Dropping it flushes buffered records.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = Vec::with_capacity(LogSink::ALL.len());

    if config.console_output {
        let filter = env_filter(&config)?;
        let console = if config.json_logs {
            fmt::layer()
                .json()
                .with_target(true)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };
        layers.push(console);
    }

    for sink in LogSink::ALL {
        let (writer, guard) = open_sink(sink, &config)?;
        guards.push(guard);

        let layer = fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(writer);

        let layer = match sink.target() {
            Some(target) => layer
                .with_filter(Targets::new().with_target(target, LevelFilter::TRACE))
                .boxed(),
            None => layer.with_filter(env_filter(&config)?).boxed(),
        };
        layers.push(layer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        log_dir = %config.log_dir.display(),
        backup_count = config.backup_count,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { _sinks: guards })
}

fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Filter(e.to_string()))
}

/// Guard that keeps the sink writers alive. Drop to flush.
pub struct TelemetryGuard {
    _sinks: Vec<WorkerGuard>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

//! Structured logging for Gatehouse.
//!
//! Middleware never reaches for an ambient logger. It is handed a [`Logger`]
//! when the chain is wired, and emits its events inside
//! [`Logger::in_scope`], which routes them to the logger's subscriber.
//!
//! # Example
//!
//! ```rust,ignore
//! use gatehouse_telemetry::logging::{init_logging, LogConfig};
//!
//! let logger = init_logging(&LogConfig::default())?;
//! logger.in_scope(|| tracing::info!(trace_id = "0190...", "request started"));
//! ```

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{Dispatch, Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Log level or filter directive (e.g. "info", "gatehouse=debug,hyper=warn").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,

    /// Service name, attached to the startup event.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
            service_name: "gatehouse".to_string(),
        }
    }
}

impl LogConfig {
    /// Creates a development configuration with human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            ..Self::default()
        }
    }

    /// Creates a production configuration with JSON output.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

/// Injectable handle to a log subscriber.
///
/// Cloning is cheap. Events emitted inside [`in_scope`](Self::in_scope) go to
/// this logger's subscriber regardless of the thread's default.
#[derive(Debug, Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// Wraps an existing dispatcher.
    #[must_use]
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Builds a logger from any subscriber.
    pub fn from_subscriber<S>(subscriber: S) -> Self
    where
        S: tracing::Subscriber + Send + Sync + 'static,
    {
        Self::new(Dispatch::new(subscriber))
    }

    /// A logger that drops every event.
    #[must_use]
    pub fn discard() -> Self {
        Self::new(Dispatch::none())
    }

    /// A JSON logger writing into memory, plus the buffer it writes to.
    #[must_use]
    pub fn to_buffer(level: Level) -> (Self, LogBuffer) {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .with_writer(buffer.clone())
            .finish();
        (Self::from_subscriber(subscriber), buffer)
    }

    /// Runs `f` with this logger as the current subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

/// Shared in-memory log sink.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    /// Each line parsed as JSON. Lines that are not JSON are skipped.
    #[must_use]
    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// JSON events whose message equals `message`.
    #[must_use]
    pub fn events(&self, message: &str) -> Vec<serde_json::Value> {
        self.json_lines()
            .into_iter()
            .filter(|event| event["fields"]["message"] == message)
            .collect()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Initializes the logging subsystem.
///
/// The subscriber is installed as the global default (so library events are
/// captured) and also returned as a [`Logger`] for injection into middleware.
///
/// # Errors
///
/// Returns `TelemetryError::Filter` for a bad level directive and
/// `TelemetryError::SubscriberInstalled` if this runs twice.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<Logger> {
    if !config.enabled {
        return Ok(Logger::discard());
    }

    let filter = create_env_filter(&config.level)?;

    let subscriber = tracing_subscriber::registry().with(fmt_layer(config).with_filter(filter));
    let dispatch = Dispatch::new(subscriber);

    tracing::dispatcher::set_global_default(dispatch.clone())
        .map_err(|_| TelemetryError::SubscriberInstalled)?;

    let logger = Logger::new(dispatch);
    logger.in_scope(|| {
        tracing::info!(service = %config.service_name, level = %config.level, "logging initialized");
    });
    Ok(logger)
}

/// The formatting layer: JSON for shipping, pretty for a terminal.
fn fmt_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_target(config.include_target);

    if config.json_format {
        layer.json().boxed()
    } else {
        layer.pretty().boxed()
    }
}

/// Creates an env filter from a string.
///
/// # Errors
///
/// Returns error if the filter string is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::Filter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}

/// Standard log field names.
pub mod fields {
    /// Trace ID field name.
    pub const TRACE_ID: &str = "trace_id";

    /// HTTP method field name.
    pub const METHOD: &str = "method";

    /// Path (with query) field name.
    pub const PATH: &str = "path";

    /// Peer address field name.
    pub const REMOTE_ADDR: &str = "remote_addr";

    /// HTTP status code field name.
    pub const STATUS_CODE: &str = "status_code";

    /// Elapsed time field name (in milliseconds).
    pub const ELAPSED_MS: &str = "elapsed_ms";

    /// Rejection reason field name.
    pub const REASON: &str = "reason";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.json_format);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert!(config.span_events);
        assert!(config.file_line_info);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("gatehouse=debug,hyper=warn").is_ok());
        assert!(create_env_filter("gatehouse=[").is_err());
    }

    #[test]
    fn test_disabled_logging_returns_discard() {
        let config = LogConfig {
            enabled: false,
            ..Default::default()
        };
        let logger = init_logging(&config).unwrap();
        logger.in_scope(|| tracing::info!("goes nowhere"));
    }

    #[test]
    fn test_buffer_logger_captures_scoped_events() {
        let (logger, buffer) = Logger::to_buffer(Level::INFO);

        logger.in_scope(|| tracing::info!(trace_id = "t-1", "request started"));
        logger.in_scope(|| tracing::debug!("below level"));
        tracing::info!("outside scope");

        let events = buffer.events("request started");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["fields"]["trace_id"], "t-1");
        assert!(buffer.events("below level").is_empty());
        assert!(buffer.events("outside scope").is_empty());
    }

    #[test]
    fn test_loggers_are_isolated() {
        let (first, first_buf) = Logger::to_buffer(Level::INFO);
        let (second, second_buf) = Logger::to_buffer(Level::INFO);

        first.in_scope(|| tracing::warn!("one"));
        second.in_scope(|| tracing::warn!("two"));

        assert_eq!(first_buf.events("one").len(), 1);
        assert!(first_buf.events("two").is_empty());
        assert_eq!(second_buf.events("two").len(), 1);
    }
}

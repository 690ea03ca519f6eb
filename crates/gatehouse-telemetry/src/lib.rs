//! Logging and metrics for Gatehouse services.
//!
//! - **Logging**: structured `tracing` events, JSON in production, behind an
//!   injectable [`Logger`]
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate, recorded
//!   through an injectable [`RequestMetrics`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gatehouse_telemetry::{init_logging, init_metrics, LogConfig, MetricsConfig, RequestMetrics};
//!
//! let logger = init_logging(&LogConfig::production())?;
//! init_metrics(&MetricsConfig::default())?;
//! let metrics = Arc::new(RequestMetrics::new());
//! // hand `logger` and `metrics` to the middleware constructors
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogBuffer, LogConfig, Logger};
pub use metrics::{init_metrics, render_metrics, MetricsConfig, MetricsSnapshot, RequestMetrics};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

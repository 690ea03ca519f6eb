//! Prometheus metrics for Gatehouse.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `gatehouse_requests_total` | Counter | Requests that entered the pipeline |
//! | `gatehouse_errors_total` | Counter | Requests that failed (error or 5xx) |
//! | `gatehouse_panics_total` | Counter | Panics recovered by the guard |
//! | `gatehouse_in_flight_requests` | Gauge | Requests currently being processed |
//!
//! [`RequestMetrics`] is the collaborator handed to the metrics and panic
//! stages. It forwards to the `metrics` facade (a no-op until a recorder is
//! installed) and keeps its own atomic counts for readiness checks and tests.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the Prometheus recorder is installed.
    pub enabled: bool,

    /// Service name, added as a global `service` label.
    pub service_name: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "gatehouse".to_string(),
        }
    }
}

/// Installs the Prometheus recorder.
///
/// The rendered text is served by whatever route calls [`render_metrics`].
///
/// # Errors
///
/// Returns `TelemetryError::Recorder` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .add_global_label("service", config.service_name.clone())
        .install_recorder()
        .map_err(|e| TelemetryError::Recorder(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "gatehouse_requests_total",
        "Total number of requests that entered the pipeline"
    );
    describe_counter!(
        "gatehouse_errors_total",
        "Total number of requests that failed"
    );
    describe_counter!(
        "gatehouse_panics_total",
        "Total number of panics recovered by the pipeline"
    );
    describe_gauge!(
        "gatehouse_in_flight_requests",
        "Number of requests currently being processed"
    );
}

/// Request counters shared by the metrics and panic stages.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
    panics: AtomicU64,
    in_flight: AtomicI64,
}

/// Point-in-time copy of [`RequestMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Requests that entered the pipeline.
    pub requests: u64,
    /// Requests that failed.
    pub errors: u64,
    /// Panics recovered.
    pub panics: u64,
    /// Requests in flight.
    pub in_flight: i64,
}

impl RequestMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request entering the pipeline.
    pub fn request_started(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        counter!("gatehouse_requests_total").increment(1);
        gauge!("gatehouse_in_flight_requests").increment(1.0);
    }

    /// Records a request leaving the pipeline.
    pub fn request_finished(&self, failed: bool) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        gauge!("gatehouse_in_flight_requests").decrement(1.0);
        if failed {
            self.errors.fetch_add(1, Ordering::Relaxed);
            counter!("gatehouse_errors_total").increment(1);
        }
    }

    /// Records a recovered panic.
    pub fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
        counter!("gatehouse_panics_total").increment(1);
    }

    /// Returns the current counts.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }
}

//! Request counting.
//!
//! # Pipeline Position
//!
//! ```text
//! Panics → [Metrics] → Errors → Logger → (route stages) → Handler
//! ```
//!
//! Sits outside the error stage, so by the time the chain returns here an
//! error has normally been written as a status. A request counts as failed
//! when it returns an error, ends with a 5xx status, or never finishes
//! (panic or cancellation drops the in-flight guard).

use std::sync::Arc;

use gatehouse_core::{BoxFuture, Request, RequestContext, ResponseWriter, Result};
use gatehouse_telemetry::RequestMetrics;

use crate::middleware::{Middleware, Next};

/// Counts requests, failures and in-flight requests.
#[derive(Debug, Clone)]
pub struct Metrics {
    metrics: Arc<RequestMetrics>,
}

impl Metrics {
    /// Creates the stage.
    pub fn new(metrics: Arc<RequestMetrics>) -> Self {
        Self { metrics }
    }
}

impl Middleware for Metrics {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        req: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let guard = InFlight::start(&self.metrics);
            let result = next.run(ctx, w, req).await;
            let failed = result.is_err() || ctx.status().is_some_and(|s| s.is_server_error());
            guard.finish(failed);
            result
        })
    }
}

/// Decrements the in-flight gauge exactly once, even if the request future
/// is dropped or unwinds.
struct InFlight<'m> {
    metrics: &'m RequestMetrics,
    done: bool,
}

impl<'m> InFlight<'m> {
    fn start(metrics: &'m RequestMetrics) -> Self {
        metrics.request_started();
        Self {
            metrics,
            done: false,
        }
    }

    fn finish(mut self, failed: bool) {
        self.done = true;
        self.metrics.request_finished(failed);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.metrics.request_finished(true);
        }
    }
}

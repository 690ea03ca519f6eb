//! Panic containment.
//!
//! # Pipeline Position
//!
//! Outermost process-wide stage:
//!
//! ```text
//! [Panics] → Metrics → Errors → Logger → (route stages) → Handler
//! ```
//!
//! A panic anywhere below is caught here, counted, logged with the trace id,
//! route and payload, and answered with the opaque 500 body. The panic never
//! reaches the serving task, so other in-flight requests are unaffected.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use gatehouse_core::{web, BoxFuture, ErrorResponse, Request, RequestContext, ResponseWriter, Result};
use gatehouse_telemetry::{Logger, RequestMetrics};
use http::StatusCode;

use crate::middleware::{Middleware, Next};

/// Catches panics from the rest of the chain.
#[derive(Debug, Clone)]
pub struct Panics {
    logger: Logger,
    metrics: Arc<RequestMetrics>,
}

impl Panics {
    /// Creates the stage.
    pub fn new(logger: Logger, metrics: Arc<RequestMetrics>) -> Self {
        Self { logger, metrics }
    }
}

impl Middleware for Panics {
    fn name(&self) -> &'static str {
        "panics"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        req: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(next.run(ctx, w, req)).catch_unwind().await;
            let payload = match outcome {
                Ok(result) => return result,
                Err(payload) => payload,
            };

            self.metrics.record_panic();
            let route = ctx.route().map(ToString::to_string).unwrap_or_default();
            let message = panic_message(payload.as_ref());
            self.logger.in_scope(|| {
                tracing::error!(
                    trace_id = %ctx.trace_id(),
                    route = %route,
                    panic = %message,
                    "panic recovered"
                );
            });

            if !w.written() {
                if let Err(err) = web::respond(ctx, w, &ErrorResponse::internal(), StatusCode::INTERNAL_SERVER_ERROR) {
                    self.logger.in_scope(|| {
                        tracing::error!(trace_id = %ctx.trace_id(), error = %err, "failed to write panic response");
                    });
                }
            }
            Ok(())
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Chain;
    use bytes::Bytes;
    use gatehouse_core::{boxed, Handler, RouteInfo};
    use http::Method;
    use tracing::Level;

    fn explode<'a>(
        _ctx: &'a mut RequestContext,
        _w: &'a mut ResponseWriter,
        _req: Request,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { panic!("ledger corrupted") })
    }

    fn fine<'a>(
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        _req: Request,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { web::respond(ctx, w, &"fine", StatusCode::OK) })
    }

    #[tokio::test]
    async fn test_panic_becomes_opaque_500() {
        let metrics = Arc::new(RequestMetrics::new());
        let (logger, logs) = Logger::to_buffer(Level::INFO);
        let handler = Chain::new()
            .with(Panics::new(logger, Arc::clone(&metrics)))
            .then(boxed(explode));

        let mut ctx = RequestContext::new().with_route(RouteInfo::new(Method::GET, "/boom"));
        let mut w = ResponseWriter::new();
        handler
            .call(&mut ctx, &mut w, Request::new(Bytes::new()))
            .await
            .unwrap();

        assert_eq!(w.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        let body: ErrorResponse = serde_json::from_slice(w.body()).unwrap();
        assert_eq!(body, ErrorResponse::internal());
        assert!(!String::from_utf8_lossy(w.body()).contains("ledger"));
        assert_eq!(metrics.snapshot().panics, 1);

        let events = logs.events("panic recovered");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["fields"]["route"], "GET /boom");
        assert_eq!(events[0]["fields"]["panic"], "ledger corrupted");
        assert_eq!(events[0]["fields"]["trace_id"], ctx.trace_id());
    }

    #[tokio::test]
    async fn test_no_panic_passes_through() {
        let metrics = Arc::new(RequestMetrics::new());
        let handler = Chain::new()
            .with(Panics::new(Logger::discard(), Arc::clone(&metrics)))
            .then(boxed(fine));

        let mut ctx = RequestContext::new();
        let mut w = ResponseWriter::new();
        handler
            .call(&mut ctx, &mut w, Request::new(Bytes::new()))
            .await
            .unwrap();

        assert_eq!(w.status(), Some(StatusCode::OK));
        assert_eq!(metrics.snapshot().panics, 0);
    }

    #[test]
    fn test_panic_message_shapes() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "non-string panic payload");
    }
}

//! Request logging.
//!
//! # Pipeline Position
//!
//! Innermost process-wide stage:
//!
//! ```text
//! Panics → Metrics → Errors → [Logger] → (route stages) → Handler
//! ```
//!
//! Because it runs inside the error stage, an error returned from below has
//! not been written yet. The completion event reports the status that the
//! error stage is about to write. A cancelled request has no status; its
//! completion event carries `cancelled = true` instead.

use std::time::Instant;

use gatehouse_core::{BoxFuture, Request, RequestContext, ResponseWriter, Result};
use gatehouse_telemetry::Logger;
use http::StatusCode;

use crate::middleware::{Middleware, Next};

/// Logs the start and completion of every request.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    logger: Logger,
}

impl RequestLogger {
    /// Creates the stage.
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl Middleware for RequestLogger {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        req: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let started = Instant::now();
            let method = req.method().clone();
            let path = req
                .uri()
                .path_and_query()
                .map_or_else(|| req.uri().path().to_string(), ToString::to_string);
            let remote_addr = ctx
                .remote_addr()
                .map_or_else(|| "-".to_string(), |addr| addr.to_string());

            self.logger.in_scope(|| {
                tracing::info!(
                    trace_id = %ctx.trace_id(),
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    "request started"
                );
            });

            let result = next.run(ctx, w, req).await;

            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            let status = match &result {
                Ok(()) => Some(ctx.status().unwrap_or(StatusCode::OK)),
                Err(err) if err.is_cancelled() => None,
                Err(err) => Some(err.status_code()),
            };
            self.logger.in_scope(|| match status {
                Some(status) => tracing::info!(
                    trace_id = %ctx.trace_id(),
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    status_code = status.as_u16(),
                    elapsed_ms,
                    "request completed"
                ),
                // Nothing is written for a cancelled request.
                None => tracing::info!(
                    trace_id = %ctx.trace_id(),
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    cancelled = true,
                    elapsed_ms,
                    "request completed"
                ),
            });

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Chain;
    use bytes::Bytes;
    use gatehouse_core::{boxed, web, Error, Handler};
    use tracing::Level;

    fn created<'a>(
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        _req: Request,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { web::respond(ctx, w, &"made", StatusCode::CREATED) })
    }

    fn conflict<'a>(
        _ctx: &'a mut RequestContext,
        _w: &'a mut ResponseWriter,
        _req: Request,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Err(Error::trusted(StatusCode::CONFLICT, "taken")) })
    }

    fn abandoned<'a>(
        _ctx: &'a mut RequestContext,
        _w: &'a mut ResponseWriter,
        _req: Request,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Err(Error::Cancelled) })
    }

    fn request(uri: &str) -> Request {
        http::Request::builder()
            .method(http::Method::POST)
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_logs_start_and_completion() {
        let (logger, logs) = Logger::to_buffer(Level::INFO);
        let handler = Chain::new().with(RequestLogger::new(logger)).then(boxed(created));

        let mut ctx = RequestContext::new().with_remote_addr("127.0.0.1:4000".parse().unwrap());
        let mut w = ResponseWriter::new();
        handler
            .call(&mut ctx, &mut w, request("/users?page=2"))
            .await
            .unwrap();

        let started = logs.events("request started");
        assert_eq!(started.len(), 1);
        assert_eq!(started[0]["fields"]["method"], "POST");
        assert_eq!(started[0]["fields"]["path"], "/users?page=2");
        assert_eq!(started[0]["fields"]["remote_addr"], "127.0.0.1:4000");

        let completed = logs.events("request completed");
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0]["fields"]["status_code"], 201);
        assert_eq!(completed[0]["fields"]["trace_id"], ctx.trace_id());
        assert!(completed[0]["fields"]["elapsed_ms"].is_u64());
    }

    #[tokio::test]
    async fn test_reports_pending_error_status() {
        let (logger, logs) = Logger::to_buffer(Level::INFO);
        let handler = Chain::new().with(RequestLogger::new(logger)).then(boxed(conflict));

        let mut ctx = RequestContext::new();
        let mut w = ResponseWriter::new();
        let result = handler.call(&mut ctx, &mut w, request("/users")).await;

        assert!(result.is_err());
        assert_eq!(logs.events("request completed")[0]["fields"]["status_code"], 409);
        assert_eq!(logs.events("request started")[0]["fields"]["remote_addr"], "-");
    }

    #[tokio::test]
    async fn test_cancelled_request_has_no_status() {
        let (logger, logs) = Logger::to_buffer(Level::INFO);
        let handler = Chain::new().with(RequestLogger::new(logger)).then(boxed(abandoned));

        let mut ctx = RequestContext::new();
        let mut w = ResponseWriter::new();
        let result = handler.call(&mut ctx, &mut w, request("/users")).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        let completed = logs.events("request completed");
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0]["fields"]["cancelled"], true);
        assert!(completed[0]["fields"].get("status_code").is_none());
    }
}

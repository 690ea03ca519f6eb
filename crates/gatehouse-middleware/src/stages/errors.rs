//! Error classification.
//!
//! # Pipeline Position
//!
//! ```text
//! Panics → Metrics → [Errors] → Logger → (route stages) → Handler
//! ```
//!
//! Turns errors returned by the rest of the chain into responses:
//!
//! | Error | Response | Log |
//! |-------|----------|-----|
//! | `Trusted` | carried status and message | none |
//! | `Auth` | 401 / 403 with a generic message | none (the auth stages log the reason) |
//! | `Internal`, `Untrusted` | opaque 500 | `error` with the full cause chain |
//! | `Cancelled` | nothing | `debug` |
//! | `Shutdown` | nothing, returned to the dispatcher | `error` |
//!
//! All error bodies are JSON `{"message": .., "status": ..}`.

use gatehouse_core::{web, BoxFuture, Error, ErrorResponse, Request, RequestContext, ResponseWriter, Result};
use gatehouse_telemetry::Logger;
use http::StatusCode;

use crate::middleware::{Middleware, Next};

/// Writes errors from the rest of the chain as JSON responses.
#[derive(Debug, Clone)]
pub struct Errors {
    logger: Logger,
}

impl Errors {
    /// Creates the stage.
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    fn handle(&self, ctx: &mut RequestContext, w: &mut ResponseWriter, err: Error) -> Result<()> {
        match err {
            Error::Trusted { .. } | Error::Auth { .. } => {
                let status = err.status_code();
                self.write(ctx, w, &err.to_response(), status)
            }
            Error::Internal { .. } | Error::Untrusted(_) => {
                self.logger.in_scope(|| {
                    tracing::error!(
                        trace_id = %ctx.trace_id(),
                        error = %error_chain(&err),
                        "request failed"
                    );
                });
                self.write(ctx, w, &ErrorResponse::internal(), StatusCode::INTERNAL_SERVER_ERROR)
            }
            Error::Cancelled => {
                self.logger.in_scope(|| {
                    tracing::debug!(trace_id = %ctx.trace_id(), "request cancelled");
                });
                Ok(())
            }
            Error::Shutdown { .. } => {
                self.logger.in_scope(|| {
                    tracing::error!(trace_id = %ctx.trace_id(), error = %err, "shutdown requested");
                });
                Err(err)
            }
        }
    }

    fn write(
        &self,
        ctx: &mut RequestContext,
        w: &mut ResponseWriter,
        body: &ErrorResponse,
        status: StatusCode,
    ) -> Result<()> {
        if w.written() {
            self.logger.in_scope(|| {
                tracing::warn!(
                    trace_id = %ctx.trace_id(),
                    status_code = status.as_u16(),
                    "error after response was written"
                );
            });
            return Ok(());
        }
        web::respond(ctx, w, body, status)
    }
}

impl Middleware for Errors {
    fn name(&self) -> &'static str {
        "errors"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        req: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match next.run(ctx, w, req).await {
                Ok(()) => Ok(()),
                Err(err) => self.handle(ctx, w, err),
            }
        })
    }
}

/// Renders an error and its sources on one line.
fn error_chain(err: &Error) -> String {
    let mut out = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

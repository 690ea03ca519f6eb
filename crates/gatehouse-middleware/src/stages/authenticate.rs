//! Bearer token authentication.
//!
//! # Pipeline Position
//!
//! First per-route stage:
//!
//! ```text
//! ... → Logger → [Authenticate] → Authorize → Handler
//! ```
//!
//! On success the verified claims are stored in the request context. On
//! failure the chain stops with `Unauthenticated`; the reason is logged
//! here and never written to the caller.

use gatehouse_auth::Auth;
use gatehouse_core::{BoxFuture, Error, Request, RequestContext, ResponseWriter, Result};
use gatehouse_telemetry::Logger;
use http::header::AUTHORIZATION;

use crate::middleware::{Middleware, Next};

/// Requires a valid bearer token.
#[derive(Debug, Clone)]
pub struct Authenticate {
    auth: Auth,
    logger: Logger,
}

impl Authenticate {
    /// Creates the stage.
    pub fn new(auth: Auth, logger: Logger) -> Self {
        Self { auth, logger }
    }
}

impl Middleware for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        req: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // A header that is not visible ASCII is treated as malformed.
            let header = req
                .headers()
                .get(AUTHORIZATION)
                .map(|value| value.to_str().unwrap_or_default());

            let claims = match self.auth.authenticate(header) {
                Ok(claims) => claims,
                Err(err) => {
                    self.logger.in_scope(|| match err.rejection() {
                        Some(rejection) => tracing::info!(
                            trace_id = %ctx.trace_id(),
                            reason = rejection.code(),
                            detail = %rejection,
                            "authentication failed"
                        ),
                        None => tracing::error!(
                            trace_id = %ctx.trace_id(),
                            error = %err,
                            "authentication error"
                        ),
                    });
                    return Err(Error::from(err));
                }
            };

            ctx.set_claims(claims)?;
            next.run(ctx, w, req).await
        })
    }
}

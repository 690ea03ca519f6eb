//! The application dispatcher.
//!
//! [`App`] holds a [`Router`] and the process-wide middleware [`Chain`].
//! Every registered handler is stored fully composed:
//!
//! ```text
//! process_wide.then(per_route.then(handler))
//! ```
//!
//! so process-wide stages are always outermost. [`App::dispatch`] creates the
//! request's [`RequestContext`], runs the composed handler and turns the
//! buffered writer into an HTTP response. Unmatched requests run through the
//! process-wide chain too, so they are logged and counted like any other.

use std::net::SocketAddr;

use bytes::Bytes;
use gatehouse_core::web::PathParams;
use gatehouse_core::{
    boxed, BoxFuture, BoxHandler, Error, ErrorResponse, Handler, Request, RequestContext, ResponseWriter, Result,
    RouteInfo,
};
use gatehouse_middleware::Chain;
use gatehouse_telemetry::Logger;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::router::{RouteLookup, Router};
use crate::shutdown::ShutdownSignal;

/// Routes requests to composed handlers.
pub struct App {
    router: Router,
    chain: Chain,
    not_found: BoxHandler,
    method_not_allowed: BoxHandler,
    shutdown: ShutdownSignal,
    logger: Logger,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("router", &self.router)
            .field("chain", &self.chain)
            .field("shutdown", &self.shutdown.is_shutdown())
            .finish_non_exhaustive()
    }
}

fn not_found<'a>(_ctx: &'a mut RequestContext, _w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, Result<()>> {
    Box::pin(async { Err(Error::trusted(StatusCode::NOT_FOUND, "route not found")) })
}

fn method_not_allowed<'a>(
    _ctx: &'a mut RequestContext,
    _w: &'a mut ResponseWriter,
    _req: Request,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async { Err(Error::trusted(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")) })
}

impl App {
    /// Creates an app whose routes are all wrapped in `chain`.
    pub fn new(logger: Logger, chain: Chain) -> Self {
        Self {
            router: Router::new(),
            not_found: chain.then(boxed(not_found)),
            method_not_allowed: chain.then(boxed(method_not_allowed)),
            chain,
            shutdown: ShutdownSignal::new(),
            logger,
        }
    }

    /// Uses `shutdown` instead of a private signal.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// The signal triggered when a handler returns the shutdown sentinel.
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// The process-wide chain.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Registers `handler` at `method` + `pattern`, wrapped by `route_chain`
    /// and then by the process-wide chain.
    pub fn handle<H: Handler>(&mut self, method: Method, pattern: &str, route_chain: &Chain, handler: H) {
        let composed = self.chain.then(route_chain.then(boxed(handler)));
        self.router.add_route(method, pattern, composed);
    }

    /// Registers a `GET` route.
    pub fn get<H: Handler>(&mut self, pattern: &str, route_chain: &Chain, handler: H) {
        self.handle(Method::GET, pattern, route_chain, handler);
    }

    /// Runs one request through the pipeline.
    ///
    /// `cancel` is handed to the request's context; the transport cancels it
    /// when the connection drops or the request times out.
    pub async fn dispatch(
        &self,
        mut req: Request,
        remote_addr: Option<SocketAddr>,
        cancel: CancellationToken,
    ) -> http::Response<Bytes> {
        let mut ctx = RequestContext::new().with_cancellation(cancel);
        if let Some(addr) = remote_addr {
            ctx = ctx.with_remote_addr(addr);
        }

        let handler = match self.router.lookup(req.method(), req.uri().path()) {
            RouteLookup::Found(matched) => {
                let handler = matched.handler();
                ctx = ctx.with_route(RouteInfo::new(req.method().clone(), matched.pattern()));
                req.extensions_mut().insert(PathParams::new(matched.into_params()));
                handler
            }
            RouteLookup::MethodNotAllowed => &self.method_not_allowed,
            RouteLookup::NotFound => &self.not_found,
        };

        let mut w = ResponseWriter::new();
        if let Err(err) = handler.call(&mut ctx, &mut w, req).await {
            self.handle_escaped(&ctx, &mut w, &err);
        }

        w.into_response()
    }

    /// Safety net for errors no stage turned into a response.
    fn handle_escaped(&self, ctx: &RequestContext, w: &mut ResponseWriter, err: &Error) {
        let route = ctx.route().map(ToString::to_string).unwrap_or_default();

        self.logger.in_scope(|| {
            if err.is_shutdown() {
                tracing::warn!(trace_id = %ctx.trace_id(), route = %route, error = %err, "shutdown requested by handler");
            } else if err.is_cancelled() {
                tracing::debug!(trace_id = %ctx.trace_id(), route = %route, "request cancelled");
            } else {
                tracing::error!(trace_id = %ctx.trace_id(), route = %route, error = %err, "unhandled error reached dispatcher");
            }
        });

        if err.is_shutdown() {
            self.shutdown.trigger();
        }

        if w.written() {
            return;
        }

        if let Err(write_err) = write_opaque(w) {
            let internal = Error::internal(format!("failed to write fallback response: {write_err}"));
            self.logger.in_scope(|| {
                tracing::error!(trace_id = %ctx.trace_id(), error = %internal, "fallback response failed");
            });
        }
    }
}

fn write_opaque(w: &mut ResponseWriter) -> Result<()> {
    let body = serde_json::to_vec(&ErrorResponse::internal()).map_err(Error::untrusted)?;
    w.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    w.write(StatusCode::INTERNAL_SERVER_ERROR, Bytes::from(body))
}

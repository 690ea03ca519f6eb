//! HTTP serving loop.
//!
//! Built on hyper's HTTP/1 connection driver and Tokio:
//!
//! - one task per connection, tracked for graceful shutdown
//! - request bodies collected with a timeout before dispatch
//! - a per-request [`CancellationToken`] cancelled when hyper drops the
//!   request (connection closed) or the request timeout elapses
//!
//! # Example
//!
//! ```rust,no_run
//! use gatehouse_middleware::Chain;
//! use gatehouse_server::{App, Server, ServerConfig};
//! use gatehouse_telemetry::Logger;
//!
//! # async fn example() -> Result<(), gatehouse_server::ServerError> {
//! let logger = Logger::discard();
//! let app = App::new(logger.clone(), Chain::new());
//! Server::new(app, ServerConfig::default(), logger).run().await
//! # }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use gatehouse_core::ErrorResponse;
use gatehouse_telemetry::Logger;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Response type handed to hyper.
pub type HttpResponse = Response<Full<Bytes>>;

/// Serves an [`App`] over HTTP/1.1.
#[derive(Debug)]
pub struct Server {
    app: Arc<App>,
    config: ServerConfig,
    logger: Logger,
}

impl Server {
    /// Creates a server for `app`.
    pub fn new(app: App, config: ServerConfig, logger: Logger) -> Self {
        Self {
            app: Arc::new(app),
            config,
            logger,
        }
    }

    /// The app's shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.app.shutdown_signal().clone()
    }

    /// Binds the configured address and serves until SIGINT, SIGTERM or a
    /// handler-requested shutdown.
    pub async fn run(self) -> ServerResult<()> {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))?;

        self.shutdown_signal().listen_for_os_signals(self.logger.clone());
        self.serve(listener).await
    }

    /// Serves connections from `listener` until the app's shutdown signal
    /// fires, then waits up to the shutdown timeout for open connections.
    pub async fn serve(self, listener: TcpListener) -> ServerResult<()> {
        let local_addr = listener.local_addr()?;
        let shutdown = self.shutdown_signal();
        let tracker = ConnectionTracker::new();
        let server = Arc::new(self);

        server
            .logger
            .in_scope(|| tracing::info!(addr = %local_addr, "server listening"));

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(err) = server.handle_connection(stream, remote_addr, shutdown).await {
                                server.logger.in_scope(|| {
                                    tracing::debug!(remote_addr = %remote_addr, error = %err, "connection error");
                                });
                            }
                            drop(token);
                        });
                    }
                    Err(err) => server.logger.in_scope(|| {
                        tracing::error!(error = %err, "failed to accept connection");
                    }),
                },

                () = shutdown.recv() => break,
            }
        }

        let timeout = server.config.shutdown_timeout();
        server.logger.in_scope(|| {
            tracing::info!(
                active_connections = tracker.active_connections(),
                timeout_secs = timeout.as_secs(),
                "shutdown: draining connections"
            );
        });

        if tokio::time::timeout(timeout, tracker.wait_for_idle()).await.is_err() {
            server.logger.in_scope(|| {
                tracing::warn!(
                    active_connections = tracker.active_connections(),
                    "shutdown timeout reached"
                );
            });
        }

        server.logger.in_scope(|| tracing::info!("server stopped"));
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |req: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(req, remote_addr).await) }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                // Finish the in-flight request, then close.
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(&self, req: http::Request<Incoming>, remote_addr: SocketAddr) -> HttpResponse {
        let cancel = CancellationToken::new();
        // hyper drops this future when the client goes away.
        let guard = cancel.clone().drop_guard();

        let (parts, body) = req.into_parts();
        let body = match tokio::time::timeout(self.config.body_timeout(), body.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(err)) => {
                self.logger.in_scope(|| {
                    tracing::info!(remote_addr = %remote_addr, error = %err, "failed to read request body");
                });
                return error_response(StatusCode::BAD_REQUEST, "failed to read request body");
            }
            Err(_) => return error_response(StatusCode::REQUEST_TIMEOUT, "request body timed out"),
        };

        let req = http::Request::from_parts(parts, body);
        let dispatch = self.app.dispatch(req, Some(remote_addr), cancel.clone());

        let response = match tokio::time::timeout(self.config.request_timeout(), dispatch).await {
            Ok(response) => response.map(Full::new),
            Err(_) => {
                cancel.cancel();
                self.logger.in_scope(|| {
                    tracing::warn!(remote_addr = %remote_addr, "request timed out");
                });
                error_response(StatusCode::SERVICE_UNAVAILABLE, "request timed out")
            }
        };

        guard.disarm();
        response
    }
}

fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    let body = ErrorResponse {
        message: message.to_string(),
        status: status.as_u16(),
    };
    let bytes = serde_json::to_vec(&body).map(Bytes::from).unwrap_or_default();

    let mut response = Response::new(Full::new(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let response = error_response(StatusCode::REQUEST_TIMEOUT, "request body timed out");
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }
}

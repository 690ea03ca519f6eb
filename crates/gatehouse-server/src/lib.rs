//! # Gatehouse Server
//!
//! HTTP serving for Gatehouse services:
//!
//! - [`App`]: router plus process-wide chain; creates each request's context
//! - [`Router`]: method and `{param}` path template matching
//! - [`Server`]: hyper HTTP/1 loop with body and request timeouts
//! - [`ShutdownSignal`] / [`ConnectionTracker`]: graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gatehouse_middleware::{process_wide, Chain};
//! use gatehouse_server::{App, Server, ServerConfig};
//! use gatehouse_telemetry::{Logger, RequestMetrics};
//!
//! # async fn example() -> Result<(), gatehouse_server::ServerError> {
//! let logger = Logger::discard();
//! let chain = process_wide(&logger, Arc::new(RequestMetrics::new()));
//! let app = App::new(logger.clone(), chain);
//!
//! Server::new(app, ServerConfig::default(), logger).run().await
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod config;
mod error;
mod router;
mod server;
mod shutdown;

pub use app::App;
pub use config::{ServerConfig, DEFAULT_BODY_TIMEOUT, DEFAULT_HTTP_ADDR, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT};
pub use error::{ServerError, ServerResult};
pub use router::{RouteLookup, RouteMatch, Router};
pub use server::{HttpResponse, Server};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};

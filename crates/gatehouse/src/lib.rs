//! # Gatehouse
//!
//! **Authenticated HTTP services with a fixed middleware pipeline**
//!
//! Gatehouse provides:
//!
//! - **Uniform handlers** – endpoints and middleware share one shape
//! - **Token authentication** – RS256 bearer tokens verified by `kid`
//! - **Rego authorization** – embedded policies, evaluated per route
//! - **Safe failures** – panics and internal errors never leak detail
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gatehouse::prelude::*;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let logger = Logger::discard();
//! let metrics = Arc::new(RequestMetrics::new());
//! let keys = Arc::new(KeyStore::load_from_dir("zarf/keys")?);
//! let auth = Auth::new(AuthConfig::default(), keys)?;
//!
//! let app = gatehouse::sales::app(&auth, &logger, metrics);
//! Server::new(app, ServerConfig::default(), logger).run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → Panics → Metrics → Errors → Logger → Authenticate → Authorize → Handler
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod keys;
pub mod sales;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export core types
pub use gatehouse_core as core;

// Re-export server types
pub use gatehouse_server as server;

// Re-export middleware types
pub use gatehouse_middleware as middleware;

// Re-export telemetry types
pub use gatehouse_telemetry as telemetry;

// Re-export configuration types
pub use gatehouse_config as config;

// Re-export auth types
pub use gatehouse_auth as auth;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use gatehouse_auth::{Auth, AuthConfig, KeyStore, Rule};
    pub use gatehouse_config::{ConfigLoader, GatehouseConfig};
    pub use gatehouse_core::{
        boxed, web, BoxFuture, Claims, Error, Handler, Request, RequestContext, ResponseWriter, Result,
    };
    pub use gatehouse_middleware::{authenticated, authorized, process_wide, Chain, Owner};
    pub use gatehouse_server::{App, Server, ServerConfig, ShutdownSignal};
    pub use gatehouse_telemetry::{Logger, RequestMetrics};
}

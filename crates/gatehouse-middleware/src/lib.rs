//! # Gatehouse Middleware
//!
//! Middleware composition and the request pipeline stages.
//!
//! ## Pipeline
//!
//! ```text
//! Request → Panics → Metrics → Errors → Logger → Authenticate → Authorize → Handler
//!           └──────────── process-wide ───────┘ └───── per-route ──────┘
//! ```
//!
//! Process-wide stages wrap every route and are always outermost. Per-route
//! stages are applied to a handler first, then the process-wide chain wraps
//! the result.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gatehouse_middleware::process_wide;
//! use gatehouse_telemetry::{Logger, RequestMetrics};
//!
//! let chain = process_wide(&Logger::discard(), Arc::new(RequestMetrics::new()));
//! assert_eq!(chain.names(), vec!["panics", "metrics", "errors", "logger"]);
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod middleware;
pub mod stages;

use std::sync::Arc;

use gatehouse_auth::{Auth, Rule};
use gatehouse_telemetry::{Logger, RequestMetrics};

pub use middleware::{compose, Chain, Middleware, Next};
pub use stages::{Authenticate, Authorize, Errors, Metrics, Owner, Panics, RequestLogger};

/// The process-wide chain: panics, metrics, errors, logger.
pub fn process_wide(logger: &Logger, metrics: Arc<RequestMetrics>) -> Chain {
    Chain::new()
        .with(Panics::new(logger.clone(), Arc::clone(&metrics)))
        .with(Metrics::new(metrics))
        .with(Errors::new(logger.clone()))
        .with(RequestLogger::new(logger.clone()))
}

/// A per-route chain that only authenticates.
pub fn authenticated(auth: &Auth, logger: &Logger) -> Chain {
    Chain::new().with(Authenticate::new(auth.clone(), logger.clone()))
}

/// A per-route chain that authenticates, then evaluates `rule`.
pub fn authorized(auth: &Auth, logger: &Logger, rule: Rule, owner: Owner) -> Chain {
    authenticated(auth, logger).with(Authorize::new(auth.clone(), rule, owner, logger.clone()))
}

//! Pipeline stages.
//!
//! ## Process-wide (every route, outermost first)
//!
//! 1. [`panics`] - Recover panics into an opaque 500
//! 2. [`metrics`] - Count requests, failures and in-flight requests
//! 3. [`errors`] - Write returned errors as JSON responses
//! 4. [`logger`] - Log request start and completion
//!
//! ## Per-route
//!
//! 5. [`authenticate`] - Verify the bearer token, store the claims
//! 6. [`authorize`] - Evaluate an authorization rule

pub mod authenticate;
pub mod authorize;
pub mod errors;
pub mod logger;
pub mod metrics;
pub mod panics;

pub use authenticate::Authenticate;
pub use authorize::{Authorize, Owner};
pub use errors::Errors;
pub use logger::RequestLogger;
pub use metrics::Metrics;
pub use panics::Panics;

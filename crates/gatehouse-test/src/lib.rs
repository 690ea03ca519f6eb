//! # Gatehouse Test
//!
//! Utilities for testing Gatehouse services in-process.
//!
//! - [`TestClient`] - runs requests through an [`App`](gatehouse_server::App)
//!   without a socket
//! - [`TestResponse`] - response wrapper with chaining assertions
//! - [`TokenMinter`] / [`TokenClaims`] - RS256 tokens signed with the
//!   fixture keys
//! - [`fixtures`] - the fixture key material and a ready-made
//!   [`Auth`](gatehouse_auth::Auth)
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatehouse_test::{fixtures, TestClient, TokenClaims, TokenMinter};
//! # use gatehouse_middleware::Chain;
//! # use gatehouse_server::App;
//! # use gatehouse_telemetry::Logger;
//!
//! # async fn example() -> Result<(), gatehouse_test::TestError> {
//! let _auth = fixtures::auth()?;
//! let client = TestClient::new(App::new(Logger::discard(), Chain::new()));
//! let token = TokenMinter::primary()?.mint(&TokenClaims::user("u1"))?;
//!
//! client.get("/test/auth").bearer_token(token).send().await;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod fixtures;
mod request;
mod response;
mod tokens;

pub use client::{TestClient, TestClientRequest};
pub use error::{TestError, TestResult};
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
pub use tokens::{TokenClaims, TokenMinter};

//! # Gatehouse Core
//!
//! Core types and traits for the Gatehouse request pipeline.
//!
//! This crate provides the foundational types used throughout Gatehouse:
//!
//! - [`RequestContext`] - Per-request envelope carrying trace id, start time, status and claims
//! - [`Handler`] - The `(context, response sink, request) -> error` shape
//! - [`Error`] - Tagged error type (trusted, auth, internal, untrusted, shutdown, cancelled)
//! - [`Claims`] - Claims decoded from a verified token
//! - [`web`] - `respond`, `decode` and `param` helpers for handlers

#![doc(html_root_url = "https://docs.rs/gatehouse-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod claims;
mod context;
mod error;
mod handler;
pub mod web;

pub use claims::{Claims, ROLE_ADMIN, ROLE_USER};
pub use context::{RequestContext, RouteInfo};
pub use error::{AuthKind, Error, ErrorResponse, Result, INTERNAL_ERROR_MESSAGE};
pub use handler::{boxed, BoxFuture, BoxHandler, Handler, Request};
pub use web::ResponseWriter;

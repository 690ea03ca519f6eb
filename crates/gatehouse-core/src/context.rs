//! Per-request context envelope.
//!
//! Every request gets exactly one [`RequestContext`], created by the
//! dispatcher before any middleware runs and passed by `&mut` as the first
//! argument of every [`Handler`](crate::Handler). Nothing here is global and
//! nothing outlives the request.
//!
//! The status code and the claims are single-assignment: the first write wins
//! and a second write is an [`Error::Internal`].

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use http::{Method, StatusCode};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

use crate::claims::Claims;
use crate::error::{Error, Result};

/// Method and path template of the matched route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// HTTP method.
    pub method: Method,
    /// Path template as registered, e.g. `/users/{user_id}`.
    pub pattern: String,
}

impl RouteInfo {
    /// Creates route info.
    #[must_use]
    pub fn new(method: Method, pattern: impl Into<String>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
        }
    }
}

impl fmt::Display for RouteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

/// Request-scoped metadata threaded through the handler chain.
///
/// # Example
///
/// ```
/// use gatehouse_core::RequestContext;
/// use http::StatusCode;
///
/// let mut ctx = RequestContext::new();
/// ctx.set_status(StatusCode::OK).unwrap();
/// assert!(ctx.set_status(StatusCode::CREATED).is_err());
/// assert_eq!(ctx.status(), Some(StatusCode::OK));
/// ```
#[derive(Debug)]
pub struct RequestContext {
    trace_id: String,
    now: DateTime<Utc>,
    status: Option<StatusCode>,
    claims: Option<Claims>,
    route: Option<RouteInfo>,
    remote_addr: Option<SocketAddr>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Creates a context with a fresh UUID v7 trace id and the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::now_v7().to_string(),
            now: Utc::now(),
            status: None,
            claims: None,
            route: None,
            remote_addr: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` as the request's cancellation signal.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Records the matched route.
    #[must_use]
    pub fn with_route(mut self, route: RouteInfo) -> Self {
        self.route = Some(route);
        self
    }

    /// Records the peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Returns the trace id.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Returns when the request entered the pipeline.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Returns the response status, once written.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Records the response status.
    pub fn set_status(&mut self, status: StatusCode) -> Result<()> {
        if let Some(existing) = self.status {
            return Err(Error::internal(format!(
                "status already set to {existing}, refusing {status}"
            )));
        }
        self.status = Some(status);
        Ok(())
    }

    /// Returns the authenticated claims, if any.
    #[must_use]
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    /// Records the authenticated claims.
    pub fn set_claims(&mut self, claims: Claims) -> Result<()> {
        if self.claims.is_some() {
            return Err(Error::internal("claims already set for this request"));
        }
        self.claims = Some(claims);
        Ok(())
    }

    /// Returns the matched route.
    #[must_use]
    pub fn route(&self) -> Option<&RouteInfo> {
        self.route.as_ref()
    }

    /// Returns the peer address.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Returns the request's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `true` once the transport has abandoned the request.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the transport abandons the request.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn claims(sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            iss: "test".to_string(),
            exp: 2,
            iat: 1,
            nbf: None,
            roles: vec![],
        }
    }

    #[test]
    fn test_trace_ids_are_unique() {
        let ids: HashSet<String> = (0..100)
            .map(|_| RequestContext::new().trace_id().to_string())
            .collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_trace_id_is_uuid() {
        let ctx = RequestContext::new();
        assert!(Uuid::parse_str(ctx.trace_id()).is_ok());
    }

    #[test]
    fn test_status_set_once() {
        let mut ctx = RequestContext::new();
        assert_eq!(ctx.status(), None);

        ctx.set_status(StatusCode::NO_CONTENT).unwrap();
        let err = ctx.set_status(StatusCode::OK).unwrap_err();

        assert!(matches!(err, Error::Internal { .. }));
        assert_eq!(ctx.status(), Some(StatusCode::NO_CONTENT));
    }

    #[test]
    fn test_claims_set_once() {
        let mut ctx = RequestContext::new();
        ctx.set_claims(claims("u1")).unwrap();
        assert!(ctx.set_claims(claims("u2")).is_err());
        assert_eq!(ctx.claims().map(|c| c.sub.as_str()), Some("u1"));
    }

    #[test]
    fn test_route_display() {
        let ctx = RequestContext::new().with_route(RouteInfo::new(Method::GET, "/users/{id}"));
        assert_eq!(ctx.route().unwrap().to_string(), "GET /users/{id}");
    }

    #[tokio::test]
    async fn test_cancellation_is_observable() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new().with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());

        token.cancel();
        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }
}

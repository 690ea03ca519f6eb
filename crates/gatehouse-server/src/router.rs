//! Request routing and path matching.
//!
//! Routes are keyed by method and a path template. Templates use
//! `{name}` segments for parameters, captured percent-decoded:
//!
//! ```rust
//! use gatehouse_core::{boxed, BoxFuture, Request, RequestContext, ResponseWriter, Result};
//! use gatehouse_server::{RouteLookup, Router};
//! use http::Method;
//!
//! fn get_user<'a>(
//!     _ctx: &'a mut RequestContext,
//!     _w: &'a mut ResponseWriter,
//!     _req: Request,
//! ) -> BoxFuture<'a, Result<()>> {
//!     Box::pin(async { Ok(()) })
//! }
//!
//! let mut router = Router::new();
//! router.add_route(Method::GET, "/users/{user_id}", boxed(get_user));
//!
//! match router.lookup(&Method::GET, "/users/42") {
//!     RouteLookup::Found(m) => assert_eq!(m.param("user_id"), Some("42")),
//!     _ => unreachable!(),
//! }
//! ```

use std::collections::HashMap;

use gatehouse_core::BoxHandler;
use http::Method;

/// A segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Literal(String),
    Param(String),
}

struct Route {
    method: Method,
    segments: Vec<PathSegment>,
    pattern: String,
    handler: BoxHandler,
}

impl Route {
    fn parse_segments(pattern: &str) -> Vec<PathSegment> {
        pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => PathSegment::Param(name.to_string()),
                None => PathSegment::Literal(s.to_string()),
            })
            .collect()
    }

    fn match_path(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (pattern, actual) in self.segments.iter().zip(path) {
            match pattern {
                PathSegment::Literal(expected) if expected == actual => {}
                PathSegment::Literal(_) => return None,
                PathSegment::Param(name) => {
                    // A segment that does not decode to UTF-8 matches nothing.
                    let value = urlencoding::decode(actual).ok()?;
                    params.insert(name.clone(), value.into_owned());
                }
            }
        }
        Some(params)
    }
}

/// A matched route.
pub struct RouteMatch<'r> {
    handler: &'r BoxHandler,
    pattern: &'r str,
    params: HashMap<String, String>,
}

impl<'r> RouteMatch<'r> {
    /// The composed handler registered for the route.
    pub fn handler(&self) -> &'r BoxHandler {
        self.handler
    }

    /// The path template the request matched.
    pub fn pattern(&self) -> &'r str {
        self.pattern
    }

    /// A path parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Take the extracted parameters.
    pub fn into_params(self) -> HashMap<String, String> {
        self.params
    }
}

/// Result of a router lookup.
pub enum RouteLookup<'r> {
    /// A route matched method and path.
    Found(RouteMatch<'r>),
    /// The path exists, but not for this method.
    MethodNotAllowed,
    /// Nothing matched the path.
    NotFound,
}

/// Method and path template router.
///
/// Routes are checked in registration order; the first match wins.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| format!("{} {}", r.method, r.pattern)))
            .finish()
    }
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` and `pattern`.
    pub fn add_route(&mut self, method: Method, pattern: impl AsRef<str>, handler: BoxHandler) {
        let pattern = pattern.as_ref();
        self.routes.push(Route {
            method,
            segments: Route::parse_segments(pattern),
            pattern: pattern.to_string(),
            handler,
        });
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Finds the route for a request.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup<'_> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut path_exists = false;

        for route in &self.routes {
            let Some(params) = route.match_path(&segments) else {
                continue;
            };
            if route.method == *method {
                return RouteLookup::Found(RouteMatch {
                    handler: &route.handler,
                    pattern: &route.pattern,
                    params,
                });
            }
            path_exists = true;
        }

        if path_exists {
            RouteLookup::MethodNotAllowed
        } else {
            RouteLookup::NotFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::{boxed, BoxFuture, Request, RequestContext, ResponseWriter, Result};

    fn noop<'a>(_ctx: &'a mut RequestContext, _w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn router(routes: &[(Method, &str)]) -> Router {
        let mut router = Router::new();
        for (method, pattern) in routes {
            router.add_route(method.clone(), *pattern, boxed(noop));
        }
        router
    }

    fn found<'r>(lookup: RouteLookup<'r>) -> RouteMatch<'r> {
        match lookup {
            RouteLookup::Found(m) => m,
            RouteLookup::MethodNotAllowed => panic!("method not allowed"),
            RouteLookup::NotFound => panic!("not found"),
        }
    }

    #[test]
    fn test_match_simple_path() {
        let router = router(&[(Method::GET, "/readiness")]);
        let m = found(router.lookup(&Method::GET, "/readiness"));
        assert_eq!(m.pattern(), "/readiness");
        assert!(m.into_params().is_empty());
    }

    #[test]
    fn test_match_with_params() {
        let router = router(&[(Method::GET, "/users/{user_id}/orders/{order_id}")]);
        let m = found(router.lookup(&Method::GET, "/users/42/orders/7"));
        assert_eq!(m.param("user_id"), Some("42"));
        assert_eq!(m.param("order_id"), Some("7"));
        assert_eq!(m.param("missing"), None);
    }

    #[test]
    fn test_params_are_percent_decoded() {
        let router = router(&[(Method::GET, "/users/{user_id}")]);
        let m = found(router.lookup(&Method::GET, "/users/u%201"));
        assert_eq!(m.param("user_id"), Some("u 1"));

        let m = found(router.lookup(&Method::GET, "/users/caf%C3%A9"));
        assert_eq!(m.param("user_id"), Some("café"));

        assert!(matches!(router.lookup(&Method::GET, "/users/%FF"), RouteLookup::NotFound));
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let router = router(&[(Method::GET, "/test/auth")]);
        assert!(matches!(router.lookup(&Method::GET, "/test/auth/"), RouteLookup::Found(_)));
    }

    #[test]
    fn test_method_not_allowed() {
        let router = router(&[(Method::GET, "/test")]);
        assert!(matches!(router.lookup(&Method::POST, "/test"), RouteLookup::MethodNotAllowed));
    }

    #[test]
    fn test_not_found() {
        let router = router(&[(Method::GET, "/users/{user_id}")]);
        assert!(matches!(router.lookup(&Method::GET, "/users"), RouteLookup::NotFound));
        assert!(matches!(router.lookup(&Method::GET, "/users/1/extra"), RouteLookup::NotFound));
        assert!(matches!(router.lookup(&Method::GET, "/products/1"), RouteLookup::NotFound));
    }

    #[test]
    fn test_first_registration_wins() {
        let router = router(&[(Method::GET, "/users/me"), (Method::GET, "/users/{user_id}")]);
        assert_eq!(found(router.lookup(&Method::GET, "/users/me")).pattern(), "/users/me");
        assert_eq!(found(router.lookup(&Method::GET, "/users/9")).pattern(), "/users/{user_id}");
        assert_eq!(router.route_count(), 2);
    }
}

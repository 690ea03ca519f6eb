//! Core middleware trait and the chain composer.
//!
//! A middleware turns a [`Handler`] into another `Handler` with the same
//! shape. A [`Chain`] is an ordered list of middleware; [`Chain::then`]
//! folds it right-to-left around a base handler so the first-listed
//! middleware ends up outermost:
//!
//! ```text
//! Chain[A, B].then(H)  ==  A(B(H))
//!
//! in:   A → B → H
//! out:  H → B → A
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gatehouse_core::{BoxFuture, Request, RequestContext, ResponseWriter, Result};
//! use gatehouse_middleware::{Chain, Middleware, Next};
//!
//! struct Noop;
//!
//! impl Middleware for Noop {
//!     fn name(&self) -> &'static str {
//!         "noop"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         w: &'a mut ResponseWriter,
//!         req: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Result<()>> {
//!         Box::pin(async move { next.run(ctx, w, req).await })
//!     }
//! }
//!
//! let chain = Chain::new().with(Noop).with(Noop);
//! assert_eq!(chain.names(), vec!["noop", "noop"]);
//! ```

use std::fmt;
use std::sync::Arc;

use gatehouse_core::{BoxFuture, BoxHandler, Handler, Request, RequestContext, ResponseWriter, Result};

/// A stage that wraps the rest of the chain.
///
/// # Invariants
///
/// - Middleware calls `next.run()` at most once
/// - Middleware that does not call `next.run()` short-circuits the chain and
///   must either write a response or return an error
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this stage, used in logs and debugging.
    fn name(&self) -> &'static str;

    /// Process the request through this middleware.
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        req: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>>;
}

/// The remainder of the chain below a middleware.
///
/// Consumed by [`run`](Self::run) so it can only be invoked once.
pub struct Next<'a> {
    inner: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// Creates a `Next` that invokes `inner`.
    pub fn new(inner: &'a dyn Handler) -> Self {
        Self { inner }
    }

    /// Invokes the rest of the chain.
    ///
    /// The borrows of `ctx` and `w` end when the returned future completes,
    /// so the caller can inspect both afterwards.
    pub fn run<'b>(
        self,
        ctx: &'b mut RequestContext,
        w: &'b mut ResponseWriter,
        req: Request,
    ) -> BoxFuture<'b, Result<()>>
    where
        'a: 'b,
    {
        self.inner.call(ctx, w, req)
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// A middleware bound to the handler it wraps.
struct Wrapped {
    middleware: Arc<dyn Middleware>,
    next: BoxHandler,
}

impl Handler for Wrapped {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        req: Request,
    ) -> BoxFuture<'a, Result<()>> {
        self.middleware
            .process(ctx, w, req, Next::new(self.next.as_ref()))
    }
}

/// An ordered list of middleware.
///
/// Cloning is cheap: the stages are shared.
#[derive(Clone, Default)]
pub struct Chain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage. It runs inside every stage already in the chain.
    pub fn with<M: Middleware>(self, middleware: M) -> Self {
        self.with_shared(Arc::new(middleware))
    }

    /// Appends a shared stage.
    pub fn with_shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Returns a chain running `self` outside `inner`.
    pub fn around(&self, inner: &Chain) -> Self {
        let mut stages = self.stages.clone();
        stages.extend(inner.stages.iter().cloned());
        Self { stages }
    }

    /// Wraps `handler`. The first stage becomes the outermost wrapper.
    pub fn then(&self, handler: BoxHandler) -> BoxHandler {
        self.stages.iter().rev().fold(handler, |next, middleware| {
            Arc::new(Wrapped {
                middleware: Arc::clone(middleware),
                next,
            })
        })
    }

    /// Stage names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Wraps `handler` in `chain`.
pub fn compose(chain: &Chain, handler: BoxHandler) -> BoxHandler {
    chain.then(handler)
}

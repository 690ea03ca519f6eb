//! Policy authorization.
//!
//! # Pipeline Position
//!
//! ```text
//! ... → Logger → Authenticate → [Authorize] → Handler
//! ```
//!
//! Needs the claims stored by [`Authenticate`](super::Authenticate). The
//! resource owner handed to the rule comes from an [`Owner`].

use gatehouse_auth::{Auth, AuthError, Rule};
use gatehouse_core::{web, BoxFuture, Error, Request, RequestContext, ResponseWriter, Result};
use gatehouse_telemetry::Logger;

use crate::middleware::{Middleware, Next};

/// Where the resource owner id comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    /// No owned resource; the owner fact is empty.
    None,
    /// A path parameter such as `user_id` in `/users/{user_id}`.
    Param(String),
    /// A fixed id.
    Fixed(String),
}

impl Owner {
    /// Owner taken from the named path parameter.
    pub fn param(name: impl Into<String>) -> Self {
        Self::Param(name.into())
    }

    fn resolve<'r>(&'r self, req: &'r Request) -> &'r str {
        match self {
            Self::None => "",
            Self::Param(name) => web::param(req, name),
            Self::Fixed(id) => id,
        }
    }
}

/// Evaluates an authorization rule for the authenticated caller.
#[derive(Debug, Clone)]
pub struct Authorize {
    auth: Auth,
    rule: Rule,
    owner: Owner,
    logger: Logger,
}

impl Authorize {
    /// Creates the stage.
    pub fn new(auth: Auth, rule: Rule, owner: Owner, logger: Logger) -> Self {
        Self {
            auth,
            rule,
            owner,
            logger,
        }
    }
}

impl Middleware for Authorize {
    fn name(&self) -> &'static str {
        "authorize"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        req: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(claims) = ctx.claims() else {
                return Err(Error::unauthenticated("no claims on request; route lacks authentication"));
            };

            let owner = self.owner.resolve(&req);
            let decision = self.auth.authorize(claims, owner, self.rule);

            if let Err(err) = decision {
                self.logger.in_scope(|| match &err {
                    AuthError::Forbidden { rule } => tracing::info!(
                        trace_id = %ctx.trace_id(),
                        subject = %claims.sub,
                        owner = %owner,
                        rule = %rule,
                        "authorization denied"
                    ),
                    other => tracing::error!(
                        trace_id = %ctx.trace_id(),
                        rule = %self.rule,
                        error = %other,
                        "authorization error"
                    ),
                });
                return Err(Error::from(err));
            }

            next.run(ctx, w, req).await
        })
    }
}

//! The uniform handler shape.
//!
//! Endpoints and wrapped middleware chains all implement [`Handler`]:
//!
//! ```text
//! (&mut RequestContext, &mut ResponseWriter, Request) -> Result<(), Error>
//! ```
//!
//! Any function with that shape returning a [`BoxFuture`] is a handler:
//!
//! ```
//! use gatehouse_core::{web, BoxFuture, Handler, Request, RequestContext, ResponseWriter, Result};
//! use http::StatusCode;
//!
//! fn health<'a>(
//!     ctx: &'a mut RequestContext,
//!     w: &'a mut ResponseWriter,
//!     _req: Request,
//! ) -> BoxFuture<'a, Result<()>> {
//!     Box::pin(async move { web::respond(ctx, w, &serde_json::json!({"status": "OK"}), StatusCode::OK) })
//! }
//!
//! fn assert_handler<H: Handler>(_: H) {}
//! assert_handler(health);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::context::RequestContext;
use crate::error::Result;
use crate::web::ResponseWriter;

/// Inbound request with its body already collected.
pub type Request = http::Request<Bytes>;

/// A boxed future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of request handling.
pub trait Handler: Send + Sync + 'static {
    /// Handles one request.
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        req: Request,
    ) -> BoxFuture<'a, Result<()>>;
}

/// A shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut RequestContext, &'a mut ResponseWriter, Request) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        req: Request,
    ) -> BoxFuture<'a, Result<()>> {
        (self)(ctx, w, req)
    }
}

/// Boxes a handler for registration.
pub fn boxed<H: Handler>(handler: H) -> BoxHandler {
    Arc::new(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use http::StatusCode;

    fn fail<'a>(
        _ctx: &'a mut RequestContext,
        _w: &'a mut ResponseWriter,
        _req: Request,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Err(Error::trusted(StatusCode::CONFLICT, "taken")) })
    }

    struct Echo;

    impl Handler for Echo {
        fn call<'a>(
            &'a self,
            _ctx: &'a mut RequestContext,
            w: &'a mut ResponseWriter,
            req: Request,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move { w.write(StatusCode::OK, req.into_body()) })
        }
    }

    #[tokio::test]
    async fn test_fn_is_handler() {
        let handler = boxed(fail);
        let mut ctx = RequestContext::new();
        let mut w = ResponseWriter::new();
        let err = handler
            .call(&mut ctx, &mut w, Request::new(Bytes::new()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_struct_is_handler() {
        let handler = boxed(Echo);
        let mut ctx = RequestContext::new();
        let mut w = ResponseWriter::new();
        tokio_test::block_on(handler.call(
            &mut ctx,
            &mut w,
            Request::new(Bytes::from_static(b"ping")),
        ))
        .unwrap();
        assert_eq!(w.body(), &Bytes::from_static(b"ping"));
    }
}

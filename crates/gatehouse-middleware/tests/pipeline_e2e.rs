//! End-to-end pipeline tests.
//!
//! These run the full process-wide chain with the per-route auth stages:
//!
//! 1. Panics
//! 2. Metrics
//! 3. Errors
//! 4. Logger
//! 5. Authenticate
//! 6. Authorize

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use gatehouse_auth::{Auth, AuthConfig, KeyStore, Rule};
use gatehouse_core::{
    boxed, web, BoxFuture, BoxHandler, Error, ErrorResponse, Handler, Request, RequestContext, ResponseWriter, Result,
};
use gatehouse_middleware::{authorized, process_wide, Owner};
use gatehouse_telemetry::{Logger, RequestMetrics};
use http::StatusCode;
use tracing::Level;

/// Leaf handler that counts how often its body executed.
struct Counting {
    calls: Arc<AtomicUsize>,
}

impl Handler for Counting {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        w: &'a mut ResponseWriter,
        _req: Request,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            web::respond(ctx, w, &serde_json::json!({"status": "OK"}), StatusCode::OK)
        })
    }
}

/// Leaf handler that panics when the path says so.
fn maybe_panic<'a>(
    ctx: &'a mut RequestContext,
    w: &'a mut ResponseWriter,
    req: Request,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        tokio::task::yield_now().await;
        assert!(req.uri().path() != "/panic", "handler exploded");
        web::respond(ctx, w, &serde_json::json!({"status": "OK"}), StatusCode::OK)
    })
}

/// Leaf handler that gives up once its request is cancelled.
fn until_cancelled<'a>(
    ctx: &'a mut RequestContext,
    _w: &'a mut ResponseWriter,
    _req: Request,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        ctx.cancelled().await;
        Err(Error::Cancelled)
    })
}

fn auth() -> Auth {
    Auth::new(AuthConfig::default(), Arc::new(KeyStore::new())).unwrap()
}

async fn send(handler: &BoxHandler, path: &str) -> (RequestContext, ResponseWriter) {
    let mut ctx = RequestContext::new();
    let mut w = ResponseWriter::new();
    let req = http::Request::builder().uri(path).body(Bytes::new()).unwrap();
    handler.call(&mut ctx, &mut w, req).await.unwrap();
    (ctx, w)
}

#[tokio::test]
async fn test_missing_token_never_reaches_handler() {
    let logger = Logger::discard();
    let metrics = Arc::new(RequestMetrics::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let route = authorized(&auth(), &logger, Rule::AdminOnly, Owner::None).then(boxed(Counting {
        calls: Arc::clone(&calls),
    }));
    let handler = process_wide(&logger, Arc::clone(&metrics)).then(route);

    let (ctx, w) = send(&handler, "/test").await;

    assert_eq!(w.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(ctx.status(), Some(StatusCode::UNAUTHORIZED));
    let body: ErrorResponse = serde_json::from_slice(w.body()).unwrap();
    assert_eq!(body.status, 401);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.errors, 0);
    assert_eq!(snapshot.in_flight, 0);
}

#[tokio::test]
async fn test_logger_sees_auth_failure_status() {
    let (logger, logs) = Logger::to_buffer(Level::INFO);
    let metrics = Arc::new(RequestMetrics::new());
    let route = authorized(&auth(), &logger, Rule::AdminOnly, Owner::None).then(boxed(maybe_panic));
    let handler = process_wide(&logger, metrics).then(route);

    send(&handler, "/test/auth").await;

    let completed = logs.events("request completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["fields"]["status_code"], 401);
    assert_eq!(logs.events("authentication failed")[0]["fields"]["reason"], "missing_header");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panic_is_isolated_from_concurrent_requests() {
    const N: usize = 16;

    let metrics = Arc::new(RequestMetrics::new());
    let handler = process_wide(&Logger::discard(), Arc::clone(&metrics)).then(boxed(maybe_panic));

    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let handler = Arc::clone(&handler);
            let path = if i == N / 2 { "/panic" } else { "/ok" };
            tokio::spawn(async move {
                let (_, w) = send(&handler, path).await;
                (path, w.status())
            })
        })
        .collect();

    let mut ok = 0;
    for task in tasks {
        let (path, status) = task.await.unwrap();
        if path == "/panic" {
            assert_eq!(status, Some(StatusCode::INTERNAL_SERVER_ERROR));
        } else {
            assert_eq!(status, Some(StatusCode::OK));
            ok += 1;
        }
    }

    assert_eq!(ok, N - 1);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.panics, 1);
    assert_eq!(snapshot.requests, N as u64);
    assert_eq!(snapshot.in_flight, 0);
}

#[tokio::test]
async fn test_cancellation_is_quiet_through_process_wide_chain() {
    let (logger, logs) = Logger::to_buffer(Level::INFO);
    let metrics = Arc::new(RequestMetrics::new());
    let handler = process_wide(&logger, Arc::clone(&metrics)).then(boxed(until_cancelled));

    let mut ctx = RequestContext::new();
    ctx.cancellation().cancel();
    let mut w = ResponseWriter::new();
    let req = http::Request::builder().uri("/slow").body(Bytes::new()).unwrap();

    let result = handler.call(&mut ctx, &mut w, req).await;

    assert!(result.is_ok());
    assert!(!w.written());
    assert_eq!(ctx.status(), None);
    assert_eq!(metrics.snapshot().errors, 0);

    let completed = logs.events("request completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["fields"]["cancelled"], true);
    assert!(completed[0]["fields"].get("status_code").is_none());
}

//! Serving-loop tests over a real TCP socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::{web, BoxFuture, Error, Request, RequestContext, ResponseWriter, Result};
use gatehouse_middleware::{process_wide, Chain};
use gatehouse_server::{App, Server, ServerConfig, ServerResult};
use gatehouse_telemetry::{Logger, RequestMetrics};
use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

static CANCEL_SEEN: AtomicBool = AtomicBool::new(false);

fn readiness<'a>(ctx: &'a mut RequestContext, w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move { web::respond(ctx, w, &serde_json::json!({"status": "OK"}), StatusCode::OK) })
}

fn echo<'a>(ctx: &'a mut RequestContext, w: &'a mut ResponseWriter, req: Request) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let body: serde_json::Value = serde_json::from_slice(req.body()).map_err(Error::untrusted)?;
        web::respond(ctx, w, &body, StatusCode::CREATED)
    })
}

fn slow<'a>(ctx: &'a mut RequestContext, _w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let token = ctx.cancellation().clone();
        tokio::spawn(async move {
            token.cancelled().await;
            CANCEL_SEEN.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    })
}

fn stop<'a>(_ctx: &'a mut RequestContext, _w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, Result<()>> {
    Box::pin(async { Err(Error::shutdown("integrity check failed")) })
}

async fn start() -> (String, JoinHandle<ServerResult<()>>) {
    let logger = Logger::discard();
    let mut app = App::new(logger.clone(), process_wide(&logger, Arc::new(RequestMetrics::new())));
    let none = Chain::new();
    app.get("/readiness", &none, readiness);
    app.handle(http::Method::POST, "/echo", &none, echo);
    app.get("/slow", &none, slow);
    app.get("/stop", &none, stop);

    let config = ServerConfig::default()
        .with_request_timeout(Duration::from_millis(200))
        .with_shutdown_timeout(Duration::from_secs(1));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(Server::new(app, config, logger).serve(listener));
    (addr, handle)
}

async fn send(addr: &str, method: &str, path: &str, body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: test\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    let status = raw.split_whitespace().nth(1).unwrap().parse().unwrap();
    let body = raw.split("\r\n\r\n").nth(1).unwrap_or_default().to_string();
    (status, body)
}

#[tokio::test]
async fn test_serves_routes() {
    let (addr, _server) = start().await;

    let (status, body) = send(&addr, "GET", "/readiness", "").await;
    assert_eq!(status, 200);
    assert_eq!(body, r#"{"status":"OK"}"#);

    let (status, body) = send(&addr, "POST", "/echo", r#"{"name":"bill"}"#).await;
    assert_eq!(status, 201);
    assert_eq!(body, r#"{"name":"bill"}"#);

    let (status, _) = send(&addr, "GET", "/missing", "").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_bad_body_is_opaque_500() {
    let (addr, _server) = start().await;
    let (status, body) = send(&addr, "POST", "/echo", "{not json").await;
    assert_eq!(status, 500);
    assert_eq!(body, r#"{"message":"Internal Server Error","status":500}"#);
}

#[tokio::test]
async fn test_timeout_cancels_request() {
    let (addr, _server) = start().await;

    let (status, _) = send(&addr, "GET", "/slow", "").await;
    assert_eq!(status, 503);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(CANCEL_SEEN.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_shutdown_error_stops_server() {
    let (addr, server) = start().await;

    let (status, _) = send(&addr, "GET", "/stop", "").await;
    assert_eq!(status, 500);

    let result = tokio::time::timeout(Duration::from_secs(3), server)
        .await
        .expect("server should stop")
        .expect("server task should not panic");
    assert!(result.is_ok());
}

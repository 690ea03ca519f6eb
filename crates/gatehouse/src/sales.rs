//! Routes of the `sales-api` service.
//!
//! | Route | Per-route stages |
//! |-------|------------------|
//! | `GET /readiness` | none |
//! | `GET /metrics` | none |
//! | `GET /test` | none |
//! | `GET /test/auth` | authenticate, `AdminOnly` |
//! | `GET /users/{user_id}` | authenticate, `AdminOrSubject` on `user_id` |

use std::sync::Arc;

use bytes::Bytes;
use gatehouse_auth::{Auth, AuthConfig, AuthResult, KeyLookup, KeyStore, Rule};
use gatehouse_core::{web, BoxFuture, Error, Request, RequestContext, ResponseWriter, Result};
use gatehouse_middleware::{authorized, process_wide, Chain, Owner};
use gatehouse_server::App;
use gatehouse_telemetry::{render_metrics, Logger, RequestMetrics};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use rand::Rng;

/// Prometheus text exposition content type.
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Builds [`Auth`] over a shared key store.
///
/// The store stays shared with the caller: later reloads of `keys` apply to
/// every request that follows.
pub fn auth(config: AuthConfig, keys: &Arc<KeyStore>) -> AuthResult<Auth> {
    let lookup: Arc<dyn KeyLookup> = Arc::<KeyStore>::clone(keys);
    Auth::new(config, lookup)
}

/// Builds the service: the process-wide chain plus every route above.
pub fn app(auth: &Auth, logger: &Logger, metrics: Arc<RequestMetrics>) -> App {
    let mut app = App::new(logger.clone(), process_wide(logger, metrics));
    let public = Chain::new();

    app.get("/readiness", &public, readiness);
    app.get("/metrics", &public, metrics_text);
    app.get("/test", &public, test);
    app.get(
        "/test/auth",
        &authorized(auth, logger, Rule::AdminOnly, Owner::None),
        test_auth,
    );
    app.get(
        "/users/{user_id}",
        &authorized(auth, logger, Rule::AdminOrSubject, Owner::param("user_id")),
        user,
    );

    app
}

/// Reports the service is ready to take traffic.
pub fn readiness<'a>(ctx: &'a mut RequestContext, w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move { web::respond(ctx, w, &serde_json::json!({"status": "OK"}), StatusCode::OK) })
}

/// Renders the Prometheus exporter.
pub fn metrics_text<'a>(
    ctx: &'a mut RequestContext,
    w: &'a mut ResponseWriter,
    _req: Request,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let Some(text) = render_metrics() else {
            return Err(Error::trusted(StatusCode::NOT_FOUND, "metrics are disabled"));
        };
        w.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(METRICS_CONTENT_TYPE));
        ctx.set_status(StatusCode::OK)?;
        w.write(StatusCode::OK, Bytes::from(text))
    })
}

/// Fails with a trusted error about half the time.
pub fn test<'a>(ctx: &'a mut RequestContext, w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, Result<()>> {
    let roll = rand::thread_rng().gen_range(0..100);
    Box::pin(async move { respond_roll(ctx, w, roll) })
}

fn respond_roll(ctx: &mut RequestContext, w: &mut ResponseWriter, roll: u32) -> Result<()> {
    if roll % 2 == 0 {
        return Err(Error::trusted(StatusCode::UNPROCESSABLE_ENTITY, "TRUSTED ERROR"));
    }
    web::respond(ctx, w, &serde_json::json!({"status": "OK"}), StatusCode::OK)
}

/// Reached only by callers the `AdminOnly` rule lets through.
pub fn test_auth<'a>(ctx: &'a mut RequestContext, w: &'a mut ResponseWriter, _req: Request) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move { web::respond(ctx, w, &serde_json::json!({"status": "OK"}), StatusCode::OK) })
}

/// Returns the requested user id and who asked for it.
pub fn user<'a>(ctx: &'a mut RequestContext, w: &'a mut ResponseWriter, req: Request) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let Some(claims) = ctx.claims() else {
            return Err(Error::internal("user route reached without claims"));
        };
        let body = serde_json::json!({
            "user_id": web::param(&req, "user_id"),
            "requested_by": claims.sub,
            "roles": claims.roles,
        });
        web::respond(ctx, w, &body, StatusCode::OK)
    })
}

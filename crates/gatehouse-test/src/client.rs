//! In-process client that drives an [`App`] without a socket.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use gatehouse_server::App;
use http::Method;
use tokio_util::sync::CancellationToken;

use crate::error::TestResult;
use crate::request::TestRequestBuilder;
use crate::response::TestResponse;

/// Sends requests straight into [`App::dispatch`].
///
/// Requests run the full pipeline (routing, process-wide and per-route
/// middleware) without binding a port.
///
/// ```rust,no_run
/// use gatehouse_middleware::Chain;
/// use gatehouse_server::App;
/// use gatehouse_telemetry::Logger;
/// use gatehouse_test::TestClient;
///
/// # async fn example() {
/// let client = TestClient::new(App::new(Logger::discard(), Chain::new()));
/// client.get("/missing").send().await.assert_status_code(404);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TestClient {
    app: Arc<App>,
    default_headers: Vec<(String, String)>,
    remote_addr: SocketAddr,
}

impl TestClient {
    /// Wraps `app`.
    pub fn new(app: App) -> Self {
        Self::from_arc(Arc::new(app))
    }

    /// Wraps a shared app.
    pub fn from_arc(app: Arc<App>) -> Self {
        Self {
            app,
            default_headers: Vec::new(),
            remote_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000)),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The peer address reported to handlers.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = addr;
        self
    }

    /// The wrapped app.
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// Starts a `GET`.
    pub fn get(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a `POST`.
    pub fn post(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a `PUT`.
    pub fn put(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a `DELETE`.
    pub fn delete(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl Into<String>) -> TestClientRequest<'_> {
        let builder = self
            .default_headers
            .iter()
            .fold(TestRequestBuilder::new(method, uri), |b, (name, value)| b.header(name, value));

        TestClientRequest {
            client: self,
            builder,
            cancel: CancellationToken::new(),
        }
    }
}

/// A request being built by a [`TestClient`].
#[derive(Debug)]
#[must_use = "requests do nothing until sent"]
pub struct TestClientRequest<'c> {
    client: &'c TestClient,
    builder: TestRequestBuilder,
    cancel: CancellationToken,
}

impl TestClientRequest<'_> {
    /// Adds a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the `Authorization` header verbatim.
    pub fn authorization(mut self, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.authorization(value);
        self
    }

    /// Sets `Authorization: Bearer <token>`.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_token(token);
        self
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Uses `cancel` as the request's cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Dispatches the request, returning build errors.
    pub async fn try_send(self) -> TestResult<TestResponse> {
        let req = self.builder.build()?;
        let response = self
            .client
            .app
            .dispatch(req, Some(self.client.remote_addr), self.cancel)
            .await;
        Ok(TestResponse::from(response))
    }

    /// Dispatches the request.
    ///
    /// # Panics
    ///
    /// Panics if the request could not be built.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(err) => panic!("failed to send test request: {err}"),
        }
    }
}

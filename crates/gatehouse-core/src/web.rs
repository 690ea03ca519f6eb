//! Response sink and request helpers used by handlers.
//!
//! [`respond`] is the terminal response-writing step: it records the status
//! in the envelope and buffers the body in the [`ResponseWriter`]. The
//! transport turns the writer into an HTTP response once the chain returns.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::handler::Request;

/// Buffered response produced by the handler chain.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Bytes,
}

impl ResponseWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once a response has been written.
    #[must_use]
    pub fn written(&self) -> bool {
        self.status.is_some()
    }

    /// Returns the written status.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the buffered body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Writes the status and body. A response can only be written once.
    pub fn write(&mut self, status: StatusCode, body: Bytes) -> Result<()> {
        if let Some(existing) = self.status {
            return Err(Error::internal(format!(
                "response already written with status {existing}"
            )));
        }
        self.status = Some(status);
        self.body = body;
        Ok(())
    }

    /// Converts the buffered response into an HTTP response.
    ///
    /// A writer nobody wrote to becomes an empty `200 OK`.
    #[must_use]
    pub fn into_response(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

/// Serialises `data` as JSON and writes it with `status`.
///
/// `204 No Content` writes no body.
pub fn respond<T>(
    ctx: &mut RequestContext,
    w: &mut ResponseWriter,
    data: &T,
    status: StatusCode,
) -> Result<()>
where
    T: Serialize + ?Sized,
{
    if status == StatusCode::NO_CONTENT {
        ctx.set_status(status)?;
        return w.write(status, Bytes::new());
    }

    let body = serde_json::to_vec(data).map_err(Error::untrusted)?;

    ctx.set_status(status)?;
    w.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    w.write(status, Bytes::from(body))
}

/// Business validation run by [`decode`] after deserialisation.
pub trait Validate {
    /// Returns a caller-safe message when the value is invalid.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Decodes a JSON request body and validates it.
///
/// Targets reject unknown fields by declaring `#[serde(deny_unknown_fields)]`.
/// Both decode and validation failures are trusted `400` errors.
pub fn decode<T>(req: &Request) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_slice(req.body()).map_err(|e| {
        Error::trusted(
            StatusCode::BAD_REQUEST,
            format!("unable to decode payload: {e}"),
        )
    })?;
    value
        .validate()
        .map_err(|message| Error::trusted(StatusCode::BAD_REQUEST, message))?;
    Ok(value)
}

/// Path parameters captured by the router, stored in request extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    /// Creates params from captured pairs.
    #[must_use]
    pub fn new(params: HashMap<String, String>) -> Self {
        Self(params)
    }

    /// Returns a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Returns the path parameter `name`, or `""` when the route has none.
#[must_use]
pub fn param<'r>(req: &'r Request, name: &str) -> &'r str {
    req.extensions()
        .get::<PathParams>()
        .and_then(|params| params.get(name))
        .unwrap_or("")
}

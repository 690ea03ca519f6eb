//! Response wrapper with assertion helpers.

use std::fmt;

use bytes::Bytes;
use gatehouse_core::ErrorResponse;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{TestError, TestResult};

/// A dispatched response.
///
/// The assertion methods panic with a readable message and return `&Self`
/// so they chain:
///
/// ```rust
/// use bytes::Bytes;
/// use gatehouse_test::TestResponse;
/// use http::StatusCode;
///
/// let response = http::Response::builder()
///     .status(StatusCode::UNPROCESSABLE_ENTITY)
///     .header("content-type", "application/json")
///     .body(Bytes::from_static(br#"{"message":"TRUSTED ERROR","status":422}"#))
///     .unwrap();
///
/// TestResponse::from(response)
///     .assert_status(StatusCode::UNPROCESSABLE_ENTITY)
///     .assert_error_message("TRUSTED ERROR");
/// ```
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Creates a response from raw parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self { status, headers, body }
    }

    /// The status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The status code as a `u16`.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns `true` for 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// A header as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE)
    }

    /// The raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as UTF-8 text.
    pub fn text(&self) -> TestResult<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| TestError::BodyRead(format!("invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> TestResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The body as a JSON value.
    pub fn json_value(&self) -> TestResult<serde_json::Value> {
        self.json()
    }

    /// The body as the standard error shape.
    pub fn error_body(&self) -> TestResult<ErrorResponse> {
        self.json()
    }

    /// Asserts the status code.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "expected status {expected}, got {} with body {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts the status code as a `u16`.
    pub fn assert_status_code(&self, expected: u16) -> &Self {
        match StatusCode::from_u16(expected) {
            Ok(status) => self.assert_status(status),
            Err(_) => panic!("{expected} is not a status code"),
        }
    }

    /// Asserts a header value.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let Some(actual) = self.header_str(name) else {
            panic!("header '{name}' not found");
        };
        assert_eq!(actual, expected.as_ref(), "header '{name}'");
        self
    }

    /// Asserts the body contains `expected`.
    pub fn assert_body_contains(&self, expected: impl AsRef<str>) -> &Self {
        let body = String::from_utf8_lossy(&self.body);
        let expected = expected.as_ref();
        assert!(body.contains(expected), "body should contain '{expected}', got: {body}");
        self
    }

    /// Asserts the body does not contain `unexpected`.
    pub fn assert_body_lacks(&self, unexpected: impl AsRef<str>) -> &Self {
        let body = String::from_utf8_lossy(&self.body);
        let unexpected = unexpected.as_ref();
        assert!(!body.contains(unexpected), "body should not contain '{unexpected}', got: {body}");
        self
    }

    /// Asserts a JSON field by dotted path (`"items.0.name"`).
    pub fn assert_json_field(&self, path: impl AsRef<str>, expected: &serde_json::Value) -> &Self {
        let path = path.as_ref();
        let json = match self.json_value() {
            Ok(json) => json,
            Err(err) => panic!("body is not JSON: {err}"),
        };
        let Some(actual) = json_path(&json, path) else {
            panic!("JSON path '{path}' not found in {json}");
        };
        assert_eq!(actual, expected, "JSON field '{path}'");
        self
    }

    /// Asserts the body is the error shape with `message`, and that its
    /// `status` field matches the response status.
    pub fn assert_error_message(&self, message: &str) -> &Self {
        let body = match self.error_body() {
            Ok(body) => body,
            Err(err) => panic!("body is not an error response: {err}"),
        };
        assert_eq!(body.message, message, "error message");
        assert_eq!(body.status, self.status.as_u16(), "error status field");
        self
    }

    /// Asserts the opaque 500 body.
    pub fn assert_opaque_500(&self) -> &Self {
        self.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        match self.error_body() {
            Ok(body) => assert_eq!(body, ErrorResponse::internal(), "opaque 500 body"),
            Err(err) => panic!("body is not an error response: {err}"),
        }
        self
    }
}

impl From<http::Response<Bytes>> for TestResponse {
    fn from(response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Self::new(parts.status, parts.headers, body)
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &String::from_utf8_lossy(&self.body))
            .finish()
    }
}

fn json_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .try_fold(value, |current, segment| match segment.parse::<usize>() {
            Ok(index) => current.get(index),
            Err(_) => current.get(segment),
        })
}

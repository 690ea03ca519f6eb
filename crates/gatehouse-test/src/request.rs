//! Request building for in-process tests.

use bytes::Bytes;
use gatehouse_core::Request;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use serde::Serialize;

use crate::error::{TestError, TestResult};

/// Builder for a [`Request`].
///
/// Header errors are kept until [`TestRequestBuilder::build`] so calls can
/// chain without intermediate `?`.
///
/// ```rust
/// use gatehouse_test::TestRequest;
///
/// let req = TestRequest::get("/users/42")
///     .bearer_token("abc")
///     .build()
///     .unwrap();
/// assert_eq!(req.headers()["authorization"], "Bearer abc");
/// ```
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Starts a request for `method` and `uri`.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            error: None,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            _ => self.fail(TestError::InvalidHeader(name.to_string())),
        }
        self
    }

    /// Sets the `Authorization` header verbatim.
    pub fn authorization(self, value: impl AsRef<str>) -> Self {
        self.header(AUTHORIZATION, value)
    }

    /// Sets `Authorization: Bearer <token>`.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.authorization(value)
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.body = Bytes::from(body);
                self.header(CONTENT_TYPE, "application/json")
            }
            Err(err) => {
                self.fail(err.into());
                self
            }
        }
    }

    /// Builds the request.
    pub fn build(self) -> TestResult<Request> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut builder = http::Request::builder().method(self.method).uri(&self.uri);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(self.body)
            .map_err(|e| TestError::RequestBuild(e.to_string()))
    }

    fn fail(&mut self, err: TestError) {
        self.error.get_or_insert(err);
    }
}

/// Shortcuts for [`TestRequestBuilder`].
#[derive(Debug)]
pub struct TestRequest;

impl TestRequest {
    /// A `GET` request.
    pub fn get(uri: impl Into<String>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// A `POST` request.
    pub fn post(uri: impl Into<String>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// A `PUT` request.
    pub fn put(uri: impl Into<String>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// A `DELETE` request.
    pub fn delete(uri: impl Into<String>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body_sets_content_type() {
        let req = TestRequest::post("/users")
            .json(&serde_json::json!({"name": "bill"}))
            .build()
            .unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(req.body().as_ref(), br#"{"name":"bill"}"#);
    }

    #[test]
    fn test_invalid_header_surfaces_at_build() {
        let result = TestRequest::get("/").header("bad header", "x").build();
        assert!(matches!(result, Err(TestError::InvalidHeader(name)) if name == "bad header"));
    }

    #[test]
    fn test_authorization_is_verbatim() {
        let req = TestRequest::get("/").authorization("Basic abc").build().unwrap();
        assert_eq!(req.headers()[AUTHORIZATION], "Basic abc");
    }
}

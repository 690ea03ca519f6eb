//! Test error types.

use thiserror::Error;

/// Errors raised by the test utilities.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be built.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// A header name or value is invalid.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The response body is not UTF-8.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A token could not be minted.
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Fixture keys could not be loaded.
    #[error("fixture error: {0}")]
    Fixture(#[from] gatehouse_auth::AuthError),
}

/// Result alias for test utilities.
pub type TestResult<T> = Result<T, TestError>;

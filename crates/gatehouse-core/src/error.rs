//! Error types for Gatehouse.
//!
//! [`Error`] is a closed set of variants. Middleware decides what to do with
//! an error by matching on the variant, never by probing for a status code:
//!
//! | Variant | Produced by | Written to the caller as |
//! |---------|-------------|--------------------------|
//! | `Trusted` | leaf handlers | carried status + message |
//! | `Auth` | authenticate / authorize stages | 401 or 403 with a generic message |
//! | `Internal` | infrastructure (policy engine, envelope misuse) | opaque 500 |
//! | `Untrusted` | anything else, including panics | opaque 500 |
//! | `Shutdown` | handlers that detect an unrecoverable state | never written |
//! | `Cancelled` | handlers observing a dropped connection | never written |

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Message used for every opaque 500-class response.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// The two ways a caller can fail the auth stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthKind {
    /// The caller could not prove who they are.
    Unauthenticated,
    /// The caller is known but the policy denied the request.
    Forbidden,
}

impl AuthKind {
    /// HTTP status used when this failure is written to the caller.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Generic message written to the caller. It never says why.
    #[must_use]
    pub const fn public_message(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.public_message())
    }
}

/// Standard error type for handlers and middleware.
///
/// # Example
///
/// ```
/// use gatehouse_core::Error;
/// use http::StatusCode;
///
/// fn check(name: &str) -> Result<(), Error> {
///     if name.is_empty() {
///         return Err(Error::trusted(StatusCode::BAD_REQUEST, "name is required"));
///     }
///     Ok(())
/// }
///
/// assert!(check("").unwrap_err().is_trusted());
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Handler-originated error that is safe to show to the caller.
    #[error("{message}")]
    Trusted {
        /// Status written to the caller.
        status: StatusCode,
        /// Message written to the caller.
        message: String,
    },

    /// Authentication or authorization failure.
    #[error("{kind}: {message}")]
    Auth {
        /// Which auth stage failed.
        kind: AuthKind,
        /// Internal detail. Only logged, never written.
        message: String,
    },

    /// Infrastructure failure.
    #[error("internal error: {message}")]
    Internal {
        /// Internal detail. Only logged, never written.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Any other failure.
    #[error(transparent)]
    Untrusted(#[from] anyhow::Error),

    /// The process must terminate.
    #[error("shutdown requested: {message}")]
    Shutdown {
        /// Why the process is going down.
        message: String,
    },

    /// The transport abandoned the request.
    #[error("request cancelled")]
    Cancelled,
}

impl Error {
    /// Creates a trusted error with a status and a caller-safe message.
    #[must_use]
    pub fn trusted(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Trusted {
            status,
            message: message.into(),
        }
    }

    /// Creates an `Unauthenticated` auth error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Auth {
            kind: AuthKind::Unauthenticated,
            message: message.into(),
        }
    }

    /// Creates a `Forbidden` auth error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Auth {
            kind: AuthKind::Forbidden,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Wraps any error as untrusted.
    pub fn untrusted(source: impl Into<anyhow::Error>) -> Self {
        Self::Untrusted(source.into())
    }

    /// Creates a shutdown error.
    #[must_use]
    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }

    /// Returns `true` if the error may be written verbatim to the caller.
    #[must_use]
    pub const fn is_trusted(&self) -> bool {
        matches!(self, Self::Trusted { .. })
    }

    /// Returns `true` for the shutdown sentinel.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown { .. })
    }

    /// Returns `true` if the transport abandoned the request.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the auth kind, if this is an auth failure.
    #[must_use]
    pub const fn auth_kind(&self) -> Option<AuthKind> {
        match self {
            Self::Auth { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// HTTP status used when this error is written to the caller.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Trusted { status, .. } => *status,
            Self::Auth { kind, .. } => kind.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body written to the caller for this error.
    ///
    /// Only trusted errors carry their own message. Everything else gets a
    /// fixed message so no internal detail reaches the caller.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            Self::Trusted { message, .. } => message.clone(),
            Self::Auth { kind, .. } => kind.public_message().to_string(),
            _ => INTERNAL_ERROR_MESSAGE.to_string(),
        };
        ErrorResponse {
            message,
            status: self.status_code().as_u16(),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Caller-safe message.
    pub message: String,
    /// HTTP status code.
    pub status: u16,
}

impl ErrorResponse {
    /// The opaque body used for 500-class failures.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            message: INTERNAL_ERROR_MESSAGE.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }
}

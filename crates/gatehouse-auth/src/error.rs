//! Error types for the auth crate.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::policy::Rule;

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Why a token was rejected.
///
/// Every rejection reaches the caller as the same `401`. The reason only
/// shows up in logs, so an attacker cannot tell a bad signature from an
/// expired token or an unknown key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Rejection {
    /// No `Authorization` header.
    MissingHeader,
    /// Header is not `Bearer <token>`.
    MalformedHeader,
    /// Token is not a three-part signed structure.
    MalformedToken,
    /// Token header names an algorithm outside the allow-list.
    AlgorithmNotAllowed(String),
    /// Token header has no `kid`.
    MissingKid,
    /// No verification key for the `kid`.
    UnknownKid(String),
    /// Signature does not verify.
    InvalidSignature,
    /// `exp` is in the past.
    Expired,
    /// `nbf` is in the future.
    NotYetValid,
    /// `iat` is in the future.
    IssuedInFuture,
    /// Payload is missing a required claim or has the wrong shape.
    InvalidClaims(String),
    /// The authentication rule refused the token.
    PolicyRejected,
}

impl Rejection {
    /// Stable reason code for logs.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::MalformedHeader => "malformed_header",
            Self::MalformedToken => "malformed_token",
            Self::AlgorithmNotAllowed(_) => "algorithm_not_allowed",
            Self::MissingKid => "missing_kid",
            Self::UnknownKid(_) => "unknown_kid",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::IssuedInFuture => "issued_in_future",
            Self::InvalidClaims(_) => "invalid_claims",
            Self::PolicyRejected => "policy_rejected",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlgorithmNotAllowed(alg) => write!(f, "algorithm {alg} is not allowed"),
            Self::UnknownKid(kid) => write!(f, "no key for kid {kid}"),
            Self::InvalidClaims(detail) => write!(f, "invalid claims: {detail}"),
            other => f.write_str(other.code()),
        }
    }
}

/// Errors that can occur during authentication and authorization.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The token was rejected.
    #[error("unauthenticated: {0}")]
    Unauthenticated(Rejection),

    /// The policy denied the request.
    #[error("forbidden by {rule}")]
    Forbidden {
        /// Rule that denied.
        rule: Rule,
    },

    /// Policy compilation or evaluation failed.
    #[error("policy evaluation failed: {0}")]
    Evaluation(String),

    /// A key file could not be loaded.
    #[error("failed to load key from {path}: {message}")]
    KeyLoad {
        /// Path to the key file or folder.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization error while building facts.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    /// Create a key load error.
    pub fn key_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::KeyLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the rejection, if this is an authentication failure.
    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Unauthenticated(rejection) => Some(rejection),
            _ => None,
        }
    }
}

impl From<Rejection> for AuthError {
    fn from(rejection: Rejection) -> Self {
        Self::Unauthenticated(rejection)
    }
}

impl From<AuthError> for gatehouse_core::Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated(rejection) => Self::unauthenticated(rejection.to_string()),
            AuthError::Forbidden { rule } => Self::forbidden(format!("denied by {rule}")),
            other => Self::internal_with_source("authorization subsystem failure", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::AuthKind;

    #[test]
    fn test_rejection_codes_are_distinct() {
        let all = [
            Rejection::MissingHeader,
            Rejection::MalformedHeader,
            Rejection::MalformedToken,
            Rejection::AlgorithmNotAllowed("HS256".into()),
            Rejection::MissingKid,
            Rejection::UnknownKid("k".into()),
            Rejection::InvalidSignature,
            Rejection::Expired,
            Rejection::NotYetValid,
            Rejection::IssuedInFuture,
            Rejection::InvalidClaims("sub".into()),
            Rejection::PolicyRejected,
        ];
        let codes: std::collections::HashSet<_> = all.iter().map(Rejection::code).collect();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn test_conversion_to_core_error() {
        let err: gatehouse_core::Error = AuthError::from(Rejection::Expired).into();
        assert_eq!(err.auth_kind(), Some(AuthKind::Unauthenticated));

        let err: gatehouse_core::Error = AuthError::Forbidden {
            rule: Rule::AdminOnly,
        }
        .into();
        assert_eq!(err.auth_kind(), Some(AuthKind::Forbidden));

        let err: gatehouse_core::Error = AuthError::Evaluation("bad module".into()).into();
        assert!(matches!(err, gatehouse_core::Error::Internal { .. }));
    }

    #[test]
    fn test_unknown_kid_and_expired_share_public_shape() {
        let a: gatehouse_core::Error = AuthError::from(Rejection::UnknownKid("x".into())).into();
        let b: gatehouse_core::Error = AuthError::from(Rejection::Expired).into();
        assert_eq!(a.to_response(), b.to_response());
        assert_ne!(a.to_string(), b.to_string());
    }
}

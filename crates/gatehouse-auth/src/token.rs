//! Bearer token validation.
//!
//! Validation order:
//!
//! ```text
//! "Bearer <token>" → header (alg, kid) → alg allow-list → key by kid
//!     → signature → exp / nbf → iat
//! ```
//!
//! The payload is not trusted until the signature verifies. Each step fails
//! with its own [`Rejection`] so logs can tell them apart.

use std::sync::Arc;

use gatehouse_core::Claims;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, get_current_timestamp, Validation};

use crate::config::AuthConfig;
use crate::error::{AuthResult, Rejection};
use crate::keystore::{KeyLookup, VerificationKey};

/// Claims that passed signature and time checks, with what verified them.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// Decoded claims.
    pub claims: Claims,
    /// Key that verified the signature.
    pub key: Arc<VerificationKey>,
    /// The raw token.
    pub token: String,
}

/// Verifies signed tokens against a [`KeyLookup`].
#[derive(Clone)]
pub struct TokenValidator {
    keys: Arc<dyn KeyLookup>,
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a validator.
    pub fn new(keys: Arc<dyn KeyLookup>, config: AuthConfig) -> Self {
        Self { keys, config }
    }

    /// Validates the raw `Authorization` header value.
    pub fn validate(&self, authorization: Option<&str>) -> AuthResult<VerifiedToken> {
        let token = bearer_token(authorization)?;

        let header = decode_header(token).map_err(|_| Rejection::MalformedToken)?;
        if !self.config.algorithms.contains(&header.alg) {
            return Err(Rejection::AlgorithmNotAllowed(format!("{:?}", header.alg)).into());
        }

        let kid = header.kid.ok_or(Rejection::MissingKid)?;
        let key = self
            .keys
            .lookup(&kid)
            .ok_or_else(|| Rejection::UnknownKid(kid.clone()))?;

        let mut validation = Validation::new(header.alg);
        validation.algorithms.clone_from(&self.config.algorithms);
        validation.leeway = self.config.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let data = decode::<Claims>(token, key.decoding_key(), &validation).map_err(|e| classify(e.kind()))?;

        if data.claims.iat > get_current_timestamp().saturating_add(self.config.leeway_secs) {
            return Err(Rejection::IssuedInFuture.into());
        }

        Ok(VerifiedToken {
            claims: data.claims,
            key,
            token: token.to_string(),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Extracts the token from a `Bearer <token>` header value.
pub fn bearer_token(authorization: Option<&str>) -> Result<&str, Rejection> {
    let value = authorization.ok_or(Rejection::MissingHeader)?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(Rejection::MalformedHeader),
    }
}

fn classify(kind: &ErrorKind) -> Rejection {
    match kind {
        ErrorKind::ExpiredSignature => Rejection::Expired,
        ErrorKind::ImmatureSignature => Rejection::NotYetValid,
        ErrorKind::InvalidSignature => Rejection::InvalidSignature,
        ErrorKind::InvalidAlgorithm => Rejection::AlgorithmNotAllowed("mismatch".to_string()),
        ErrorKind::MissingRequiredClaim(claim) => {
            Rejection::InvalidClaims(format!("missing {claim}"))
        }
        ErrorKind::Json(e) => Rejection::InvalidClaims(e.to_string()),
        _ => Rejection::MalformedToken,
    }
}

//! RS256 token minting with the fixture keys.

use std::time::{SystemTime, UNIX_EPOCH};

use gatehouse_auth::DEFAULT_ISSUER;
use gatehouse_core::{ROLE_ADMIN, ROLE_USER};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::error::TestResult;
use crate::fixtures::{PRIMARY_KID, PRIMARY_PRIVATE_PEM, SECONDARY_KID, SECONDARY_PRIVATE_PEM};

/// Claims for a minted token.
///
/// Times are offsets in seconds from now, so tests can express "expired a
/// minute ago" as `expires_in(-60)`.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    subject: String,
    issuer: String,
    roles: Vec<String>,
    issued_at: i64,
    expires_in: i64,
    not_before: Option<i64>,
}

#[derive(Serialize)]
struct Wire<'a> {
    sub: &'a str,
    iss: &'a str,
    iat: u64,
    exp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    nbf: Option<u64>,
    roles: &'a [String],
}

impl TokenClaims {
    /// A one-hour token for `subject` with `roles`.
    pub fn new<S: Into<String>>(subject: impl Into<String>, roles: impl IntoIterator<Item = S>) -> Self {
        Self {
            subject: subject.into(),
            issuer: DEFAULT_ISSUER.to_string(),
            roles: roles.into_iter().map(Into::into).collect(),
            issued_at: 0,
            expires_in: 3600,
            not_before: None,
        }
    }

    /// A `USER` token for `subject`.
    pub fn user(subject: impl Into<String>) -> Self {
        Self::new(subject, [ROLE_USER])
    }

    /// An `ADMIN` token for `subject`.
    pub fn admin(subject: impl Into<String>) -> Self {
        Self::new(subject, [ROLE_ADMIN])
    }

    /// Overrides the issuer.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Expiry relative to now.
    pub fn expires_in(mut self, secs: i64) -> Self {
        self.expires_in = secs;
        self
    }

    /// Issued-at relative to now.
    pub fn issued_at(mut self, secs: i64) -> Self {
        self.issued_at = secs;
        self
    }

    /// Not-before relative to now.
    pub fn not_before(mut self, secs: i64) -> Self {
        self.not_before = Some(secs);
        self
    }

    fn to_wire(&self, now: u64) -> Wire<'_> {
        Wire {
            sub: &self.subject,
            iss: &self.issuer,
            iat: now.saturating_add_signed(self.issued_at),
            exp: now.saturating_add_signed(self.expires_in),
            nbf: self.not_before.map(|offset| now.saturating_add_signed(offset)),
            roles: &self.roles,
        }
    }
}

/// Signs tokens with one private key.
#[derive(Clone)]
pub struct TokenMinter {
    kid: Option<String>,
    key: EncodingKey,
}

impl std::fmt::Debug for TokenMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenMinter").field("kid", &self.kid).finish_non_exhaustive()
    }
}

impl TokenMinter {
    /// A minter for an RSA private key in PEM form.
    pub fn new(kid: impl Into<String>, private_pem: &str) -> TestResult<Self> {
        Ok(Self {
            kid: Some(kid.into()),
            key: EncodingKey::from_rsa_pem(private_pem.as_bytes())?,
        })
    }

    /// The minter for the primary fixture key.
    pub fn primary() -> TestResult<Self> {
        Self::new(PRIMARY_KID, PRIMARY_PRIVATE_PEM)
    }

    /// The minter for the secondary fixture key.
    pub fn secondary() -> TestResult<Self> {
        Self::new(SECONDARY_KID, SECONDARY_PRIVATE_PEM)
    }

    /// Uses `kid` in the header instead of the key's own id.
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Omits the `kid` header.
    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    /// Signs `claims`.
    pub fn mint(&self, claims: &TokenClaims) -> TestResult<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.kid);
        Ok(encode(&header, &claims.to_wire(now()), &self.key)?)
    }

    /// Signs `claims` and formats the `Authorization` header value.
    pub fn bearer(&self, claims: &TokenClaims) -> TestResult<String> {
        Ok(format!("Bearer {}", self.mint(claims)?))
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

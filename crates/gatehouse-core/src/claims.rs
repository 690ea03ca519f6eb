//! Token claims carried in the request envelope after authentication.

use serde::{Deserialize, Serialize};

/// Role that passes every authorization rule.
pub const ROLE_ADMIN: &str = "ADMIN";

/// Role given to ordinary users.
pub const ROLE_USER: &str = "USER";

/// Claims decoded from a verified token.
///
/// Time claims are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the caller's user id).
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Expiry.
    pub exp: u64,
    /// Issued at.
    pub iat: u64,
    /// Not before.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    /// Application roles.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    /// Returns `true` if the claims carry `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

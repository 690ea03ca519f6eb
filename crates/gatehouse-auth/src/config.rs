//! Configuration for token validation and policy evaluation.

use std::str::FromStr;

use jsonwebtoken::Algorithm;

use crate::error::{AuthError, AuthResult};

/// Issuer stamped into tokens minted for this service.
pub const DEFAULT_ISSUER: &str = "service project";

/// Configuration for the auth subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Expected `iss` claim.
    pub issuer: String,
    /// Signing algorithms accepted. Never taken from the token.
    pub algorithms: Vec<Algorithm>,
    /// Clock skew tolerated on `exp`, `nbf` and `iat`, in seconds.
    pub leeway_secs: u64,
    /// Whether Rego builtin errors abort evaluation.
    pub strict_policy: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            algorithms: vec![Algorithm::RS256],
            leeway_secs: 0,
            strict_policy: true,
        }
    }
}

impl AuthConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expected issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the algorithm allow-list.
    #[must_use]
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Set the algorithm allow-list from names such as `"RS256"`.
    pub fn with_algorithm_names<S: AsRef<str>>(mut self, names: &[S]) -> AuthResult<Self> {
        self.algorithms = names
            .iter()
            .map(|name| {
                Algorithm::from_str(name.as_ref().trim())
                    .map_err(|_| AuthError::Config(format!("unknown algorithm {}", name.as_ref())))
            })
            .collect::<AuthResult<_>>()?;
        Ok(self)
    }

    /// Set the clock skew tolerance.
    #[must_use]
    pub fn with_leeway_secs(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Enable or disable strict builtin errors in Rego.
    #[must_use]
    pub fn with_strict_policy(mut self, strict: bool) -> Self {
        self.strict_policy = strict;
        self
    }

    /// Validate the configuration.
    ///
    /// Keys are RSA public keys, so only RSA-family algorithms are accepted.
    pub fn validate(&self) -> AuthResult<()> {
        if self.issuer.trim().is_empty() {
            return Err(AuthError::Config("issuer must not be empty".to_string()));
        }
        if self.algorithms.is_empty() {
            return Err(AuthError::Config(
                "at least one signing algorithm is required".to_string(),
            ));
        }
        if let Some(alg) = self.algorithms.iter().find(|alg| !is_rsa(**alg)) {
            return Err(AuthError::Config(format!(
                "algorithm {alg:?} is not an RSA algorithm"
            )));
        }
        Ok(())
    }
}

const fn is_rsa(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.issuer, "service project");
        assert_eq!(config.algorithms, vec![Algorithm::RS256]);
        assert_eq!(config.leeway_secs, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = AuthConfig::new()
            .with_issuer("sales")
            .with_leeway_secs(5)
            .with_algorithm_names(&["RS256", "PS512"])
            .unwrap();
        assert_eq!(config.issuer, "sales");
        assert_eq!(config.leeway_secs, 5);
        assert_eq!(config.algorithms, vec![Algorithm::RS256, Algorithm::PS512]);
    }

    #[test]
    fn test_unknown_algorithm_name() {
        let err = AuthConfig::new().with_algorithm_names(&["RS999"]).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn test_rejects_symmetric_algorithms() {
        let config = AuthConfig::new().with_algorithms(vec![Algorithm::RS256, Algorithm::HS256]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_values() {
        assert!(AuthConfig::new().with_issuer(" ").validate().is_err());
        assert!(AuthConfig::new().with_algorithms(vec![]).validate().is_err());
    }
}

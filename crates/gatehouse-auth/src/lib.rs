//! # Gatehouse Auth
//!
//! Token authentication and Rego policy authorization.
//!
//! - [`KeyStore`] - verification keys by `kid`, swapped atomically on rotation
//! - [`TokenValidator`] - bearer parsing, signature and time checks
//! - [`PolicyEngine`] - rule evaluation over embedded Rego modules
//! - [`Auth`] - the facade the middleware stages call
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gatehouse_auth::{Auth, AuthConfig, KeyStore, Rule};
//!
//! # fn example() -> Result<(), gatehouse_auth::AuthError> {
//! let keys = Arc::new(KeyStore::load_from_dir("zarf/keys")?);
//! let auth = Auth::new(AuthConfig::default(), keys)?;
//!
//! let claims = auth.authenticate(Some("Bearer eyJ..."))?;
//! auth.authorize(&claims, "u1", Rule::AdminOrSubject)?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/gatehouse-auth/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod keystore;
mod policy;
mod token;

use std::sync::Arc;

use gatehouse_core::Claims;

pub use config::{AuthConfig, DEFAULT_ISSUER};
pub use error::{AuthError, AuthResult, Rejection};
pub use keystore::{KeyLookup, KeyStore, VerificationKey};
pub use policy::{
    AuthenticationFacts, AuthorizationFacts, PolicyEngine, PolicyModule, Rule,
    AUTHENTICATION_MODULE, AUTHENTICATION_PACKAGE, AUTHORIZATION_MODULE, AUTHORIZATION_PACKAGE,
    RULE_AUTHENTICATE,
};
pub use token::{bearer_token, TokenValidator, VerifiedToken};

/// Authentication and authorization over one key source and one policy engine.
///
/// Cheap to clone; clones share the validator and the compiled policies.
#[derive(Debug, Clone)]
pub struct Auth {
    validator: Arc<TokenValidator>,
    policy: Arc<PolicyEngine>,
}

impl Auth {
    /// Builds the facade with the embedded policy modules.
    pub fn new(config: AuthConfig, keys: Arc<dyn KeyLookup>) -> AuthResult<Self> {
        config.validate()?;
        let policy = PolicyEngine::with_default_modules(config.strict_policy)?;
        Ok(Self::with_policy(config, keys, Arc::new(policy)))
    }

    /// Builds the facade around an existing policy engine.
    #[must_use]
    pub fn with_policy(config: AuthConfig, keys: Arc<dyn KeyLookup>, policy: Arc<PolicyEngine>) -> Self {
        Self {
            validator: Arc::new(TokenValidator::new(keys, config)),
            policy,
        }
    }

    /// Verifies the `Authorization` header value and returns the claims.
    ///
    /// The token must verify against the key named by its `kid` and pass the
    /// time checks. The authentication rule then checks the issuer.
    pub fn authenticate(&self, authorization: Option<&str>) -> AuthResult<Claims> {
        let verified = self.validator.validate(authorization)?;

        let facts = AuthenticationFacts {
            key: verified.key.pem(),
            token: &verified.token,
            iss: &self.validator.config().issuer,
            claims: &verified.claims,
        };
        if !self.policy.authenticate(&facts)? {
            return Err(Rejection::PolicyRejected.into());
        }

        Ok(verified.claims)
    }

    /// Evaluates `rule` for `claims` acting on a resource owned by `owner`.
    ///
    /// Pass an empty `owner` for routes that do not act on an owned resource.
    pub fn authorize(&self, claims: &Claims, owner: &str, rule: Rule) -> AuthResult<()> {
        let facts = AuthorizationFacts {
            roles: &claims.roles,
            subject: &claims.sub,
            user_id: owner,
        };
        if self.policy.authorize(rule, &facts)? {
            Ok(())
        } else {
            Err(AuthError::Forbidden { rule })
        }
    }

    /// The compiled policies.
    #[must_use]
    pub fn policy(&self) -> &Arc<PolicyEngine> {
        &self.policy
    }

    /// Validator configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        self.validator.config()
    }
}

//! Authorization decisions delegated to Rego rule modules.
//!
//! The engine is compiled once from the embedded modules and kept behind an
//! [`ArcSwap`]. Each evaluation clones the compiled engine, sets a freshly
//! built input document and runs `x = data.<package>.<rule>`. The decision
//! is the boolean bound to `x`:
//!
//! - `true` admits
//! - `false`, a non-boolean, or no result at all denies
//! - an engine error is an [`AuthError::Evaluation`], never a denial

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use regorus::{Engine, Value};
use serde::Serialize;

use crate::error::{AuthError, AuthResult};

/// Authentication rule module.
pub const AUTHENTICATION_MODULE: &str = include_str!("../rego/authentication.rego");

/// Authorization rule module.
pub const AUTHORIZATION_MODULE: &str = include_str!("../rego/authorization.rego");

/// Package of the authentication module.
pub const AUTHENTICATION_PACKAGE: &str = "gatehouse.authentication";

/// Package of the authorization module.
pub const AUTHORIZATION_PACKAGE: &str = "gatehouse.authorization";

/// Rule in the authentication module.
pub const RULE_AUTHENTICATE: &str = "auth";

const DECISION_BINDING: &str = "x";

/// Authorization rule selected per route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Admits callers holding the `ADMIN` role.
    AdminOnly,
    /// Admits `ADMIN` callers and callers acting on their own resource.
    AdminOrSubject,
}

impl Rule {
    /// Rule name inside the authorization module.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AdminOnly => "rule_admin_only",
            Self::AdminOrSubject => "rule_admin_or_subject",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Facts for the authentication rule.
#[derive(Debug, Serialize)]
pub struct AuthenticationFacts<'a, C: Serialize> {
    /// Verification key PEM.
    #[serde(rename = "Key")]
    pub key: &'a str,
    /// Raw token string.
    #[serde(rename = "Token")]
    pub token: &'a str,
    /// Expected issuer.
    #[serde(rename = "ISS")]
    pub iss: &'a str,
    /// Verified claims.
    #[serde(rename = "Claims")]
    pub claims: &'a C,
}

/// Facts for the authorization rules.
#[derive(Debug, Serialize)]
pub struct AuthorizationFacts<'a> {
    /// Caller roles.
    #[serde(rename = "Roles")]
    pub roles: &'a [String],
    /// Caller subject.
    #[serde(rename = "Subject")]
    pub subject: &'a str,
    /// Owner of the resource being acted on.
    #[serde(rename = "UserID")]
    pub user_id: &'a str,
}

/// A named Rego module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyModule {
    /// File name reported in engine errors.
    pub name: String,
    /// Rego source.
    pub source: String,
}

impl PolicyModule {
    /// Creates a module.
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// The two modules shipped with the crate.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("authentication.rego", AUTHENTICATION_MODULE),
            Self::new("authorization.rego", AUTHORIZATION_MODULE),
        ]
    }
}

/// Compiled rule modules plus the evaluation protocol.
pub struct PolicyEngine {
    engine: ArcSwap<Engine>,
    strict: bool,
}

impl PolicyEngine {
    /// Compiles `modules` into a new engine.
    pub fn new(modules: &[PolicyModule], strict: bool) -> AuthResult<Self> {
        let engine = compile(modules, strict)?;
        Ok(Self {
            engine: ArcSwap::from_pointee(engine),
            strict,
        })
    }

    /// Compiles the embedded authentication and authorization modules.
    pub fn with_default_modules(strict: bool) -> AuthResult<Self> {
        Self::new(&PolicyModule::defaults(), strict)
    }

    /// Compiles `modules` and swaps them in. On error the current modules stay.
    pub fn replace_modules(&self, modules: &[PolicyModule]) -> AuthResult<()> {
        let engine = compile(modules, self.strict)?;
        self.engine.store(Arc::new(engine));
        Ok(())
    }

    /// Evaluates `data.<package>.<rule>` against `input`.
    pub fn evaluate(&self, package: &str, rule: &str, input: serde_json::Value) -> AuthResult<bool> {
        let mut engine = Engine::clone(&self.engine.load());
        engine.set_input(input.into());

        let query = format!("{DECISION_BINDING} = data.{package}.{rule}");
        let results = engine
            .eval_query(query, false)
            .map_err(|e| AuthError::Evaluation(format!("{package}.{rule}: {e}")))?;

        match results.result.as_slice() {
            [] => Ok(false),
            [only] => Ok(matches!(decision(&only.bindings), Some(Value::Bool(true)))),
            many => Err(AuthError::Evaluation(format!(
                "{package}.{rule}: expected one result set, got {}",
                many.len()
            ))),
        }
    }

    /// Evaluates an authorization rule.
    pub fn authorize(&self, rule: Rule, facts: &AuthorizationFacts<'_>) -> AuthResult<bool> {
        self.evaluate(AUTHORIZATION_PACKAGE, rule.name(), serde_json::to_value(facts)?)
    }

    /// Evaluates the authentication rule.
    pub fn authenticate<C: Serialize>(&self, facts: &AuthenticationFacts<'_, C>) -> AuthResult<bool> {
        self.evaluate(
            AUTHENTICATION_PACKAGE,
            RULE_AUTHENTICATE,
            serde_json::to_value(facts)?,
        )
    }
}

impl fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

fn compile(modules: &[PolicyModule], strict: bool) -> AuthResult<Engine> {
    let mut engine = Engine::new();
    engine.set_strict_builtin_errors(strict);
    for module in modules {
        engine
            .add_policy(module.name.clone(), module.source.clone())
            .map_err(|e| {
                AuthError::Evaluation(format!("failed to load policy {}: {e}", module.name))
            })?;
    }
    Ok(engine)
}

fn decision(bindings: &Value) -> Option<&Value> {
    match bindings {
        Value::Object(map) => map.get(&Value::String(DECISION_BINDING.into())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn engine() -> PolicyEngine {
        PolicyEngine::with_default_modules(true).unwrap()
    }

    fn allowed(engine: &PolicyEngine, rule: Rule, roles: &[&str], subject: &str, owner: &str) -> bool {
        let roles: Vec<String> = roles.iter().map(ToString::to_string).collect();
        engine
            .authorize(
                rule,
                &AuthorizationFacts {
                    roles: &roles,
                    subject,
                    user_id: owner,
                },
            )
            .unwrap()
    }

    #[test]
    fn test_default_modules_compile() {
        assert!(PolicyEngine::with_default_modules(false).is_ok());
    }

    #[test]
    fn test_admin_only() {
        let engine = engine();
        assert!(allowed(&engine, Rule::AdminOnly, &["ADMIN"], "u1", "u2"));
        assert!(!allowed(&engine, Rule::AdminOnly, &["USER"], "u1", "u1"));
        assert!(!allowed(&engine, Rule::AdminOnly, &[], "u1", "u1"));
    }

    #[test]
    fn test_admin_or_subject() {
        let engine = engine();
        assert!(allowed(&engine, Rule::AdminOrSubject, &["USER"], "u1", "u1"));
        assert!(!allowed(&engine, Rule::AdminOrSubject, &["USER"], "u1", "u2"));
        assert!(allowed(&engine, Rule::AdminOrSubject, &["ADMIN"], "u1", "u2"));
    }

    #[test]
    fn test_empty_subject_never_owns_a_resource() {
        let engine = engine();
        assert!(!allowed(&engine, Rule::AdminOrSubject, &[], "", ""));
        assert!(!allowed(&engine, Rule::AdminOrSubject, &["USER"], "", ""));
        assert!(allowed(&engine, Rule::AdminOrSubject, &["ADMIN"], "", ""));
    }

    #[test]
    fn test_authentication_rule_checks_issuer() {
        let engine = engine();
        let claims = json!({"sub": "u1", "iss": "service project"});
        let facts = |iss| AuthenticationFacts {
            key: "-----BEGIN PUBLIC KEY-----",
            token: "a.b.c",
            iss,
            claims: &claims,
        };
        assert!(engine.authenticate(&facts("service project")).unwrap());
        assert!(!engine.authenticate(&facts("someone else")).unwrap());
    }

    #[test]
    fn test_undefined_rule_is_denial() {
        let engine = engine();
        let allowed = engine
            .evaluate(AUTHORIZATION_PACKAGE, "rule_nobody_wrote", json!({}))
            .unwrap();
        assert!(!allowed);
    }

    #[test]
    fn test_non_boolean_is_denial() {
        let engine = PolicyEngine::new(
            &[PolicyModule::new("odd.rego", "package odd\nanswer := \"yes\"")],
            true,
        )
        .unwrap();
        assert!(!engine.evaluate("odd", "answer", json!({})).unwrap());
    }

    #[test]
    fn test_malformed_module_is_evaluation_error() {
        let err = PolicyEngine::new(&[PolicyModule::new("bad.rego", "package bad\nallow if {")], true)
            .unwrap_err();
        assert!(matches!(err, AuthError::Evaluation(_)));
    }

    #[test]
    fn test_replace_modules_swaps_atomically() {
        let engine = engine();
        assert!(!allowed(&engine, Rule::AdminOnly, &["USER"], "u1", "u1"));

        engine
            .replace_modules(&[PolicyModule::new(
                "authorization.rego",
                "package gatehouse.authorization\nrule_admin_only := true",
            )])
            .unwrap();
        assert!(allowed(&engine, Rule::AdminOnly, &["USER"], "u1", "u1"));

        assert!(engine
            .replace_modules(&[PolicyModule::new("broken.rego", "package")])
            .is_err());
        assert!(allowed(&engine, Rule::AdminOnly, &["USER"], "u1", "u1"));
    }

    fn role() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("ADMIN".to_string()),
            Just("USER".to_string()),
            "[A-Z]{3,8}",
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_admin_only_ignores_subject_and_owner(
            roles in proptest::collection::vec(role(), 0..4),
            subject in "[a-z0-9]{0,6}",
            owner in "[a-z0-9]{0,6}",
        ) {
            let engine = engine();
            let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
            let expected = roles.contains(&"ADMIN");
            prop_assert_eq!(allowed(&engine, Rule::AdminOnly, &roles, &subject, &owner), expected);
            prop_assert_eq!(allowed(&engine, Rule::AdminOnly, &roles, "", "other"), expected);
        }

        #[test]
        fn prop_admin_or_subject(
            roles in proptest::collection::vec(role(), 0..4),
            subject in "[a-z0-9]{1,6}",
            owner in "[a-z0-9]{1,6}",
        ) {
            let engine = engine();
            let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
            let admin = roles.contains(&"ADMIN");
            prop_assert_eq!(
                allowed(&engine, Rule::AdminOrSubject, &roles, &subject, &owner),
                admin || subject == owner
            );
            prop_assert!(allowed(&engine, Rule::AdminOrSubject, &roles, &subject, &subject));
        }
    }
}

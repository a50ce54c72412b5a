//! Access policy: which route needs which authentication
//!
//! An ordered rule table evaluated top to bottom, first match wins. The
//! table is enforced by one middleware wrapping the whole router, so the
//! order in which handlers are registered has no influence on the outcome.

use crate::constants::{
    PATH_HEALTH, PATH_INTROSPECT, PATH_LOGIN, PATH_METADATA, PATH_REGISTER,
    PATH_REGISTRATION_FORM, PATH_REVOKE, PATH_TOKEN,
};
use serde::Serialize;

/// Path matcher for one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RoutePattern {
    /// Exact path
    Exact(String),
    /// The prefix itself and everything below it (`/a` matches `/a` and `/a/b`, not `/ab`)
    Prefix(String),
    /// Every path
    Any,
}

impl RoutePattern {
    pub fn exact(path: impl Into<String>) -> Self {
        RoutePattern::Exact(path.into())
    }

    pub fn prefix(path: impl Into<String>) -> Self {
        RoutePattern::Prefix(path.into().trim_end_matches('/').to_string())
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Exact(p) => p == path,
            RoutePattern::Prefix(p) => path
                .strip_prefix(p.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            RoutePattern::Any => true,
        }
    }
}

/// Whether a route may be reached without credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Authenticated,
}

/// Which credential the route expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    None,
    /// Handler checks client (and resource-owner) credentials itself
    ClientCredentials,
    /// Handler checks a username/password pair itself
    Password,
    Bearer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRule {
    pub pattern: RoutePattern,
    pub access: Access,
    pub mechanism: Mechanism,
}

impl AccessRule {
    pub fn public(pattern: RoutePattern) -> Self {
        Self {
            pattern,
            access: Access::Public,
            mechanism: Mechanism::None,
        }
    }

    /// Public at the HTTP layer; the handler authenticates with `mechanism`
    pub fn handler_checked(pattern: RoutePattern, mechanism: Mechanism) -> Self {
        Self {
            pattern,
            access: Access::Public,
            mechanism,
        }
    }

    pub fn bearer(pattern: RoutePattern) -> Self {
        Self {
            pattern,
            access: Access::Authenticated,
            mechanism: Mechanism::Bearer,
        }
    }
}

/// Ordered rule table with a deny-by-default fallback
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
    fallback: AccessRule,
}

impl AccessPolicy {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self {
            rules,
            fallback: AccessRule::bearer(RoutePattern::Any),
        }
    }

    /// The auth server's table
    pub fn standard() -> Self {
        Self::new(vec![
            AccessRule::public(RoutePattern::exact(PATH_REGISTER)),
            AccessRule::public(RoutePattern::exact(PATH_REGISTRATION_FORM)),
            AccessRule::handler_checked(RoutePattern::exact(PATH_LOGIN), Mechanism::Password),
            AccessRule::handler_checked(
                RoutePattern::exact(PATH_TOKEN),
                Mechanism::ClientCredentials,
            ),
            AccessRule::handler_checked(
                RoutePattern::exact(PATH_INTROSPECT),
                Mechanism::ClientCredentials,
            ),
            AccessRule::handler_checked(
                RoutePattern::exact(PATH_REVOKE),
                Mechanism::ClientCredentials,
            ),
            AccessRule::public(RoutePattern::exact(PATH_METADATA)),
            AccessRule::public(RoutePattern::exact(PATH_HEALTH)),
            AccessRule::bearer(RoutePattern::Any),
        ])
    }

    /// First rule matching `path`, or the authenticated fallback
    pub fn evaluate(&self, path: &str) -> &AccessRule {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .unwrap_or(&self.fallback)
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

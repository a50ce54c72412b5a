//! Core data model for ssogate
//!
//! Users, the statically configured client, token records and the
//! per-request principal.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use subtle::ConstantTimeEq;

/// A registered resource owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique username (registry key)
    pub username: String,

    /// Argon2id PHC string; never the plaintext password
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Granted roles (e.g. `USER`)
    pub roles: BTreeSet<String>,

    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// The single statically configured OAuth client
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: BTreeSet<String>,
}

impl RegisteredClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: scopes.into_iter().collect(),
        }
    }

    /// Check presented credentials in constant time.
    ///
    /// Both comparisons always run so the response time does not reveal
    /// which half was wrong.
    pub fn authenticate(&self, client_id: &str, client_secret: &str) -> bool {
        let id_ok = self.client_id.as_bytes().ct_eq(client_id.as_bytes());
        let secret_ok = self.client_secret.as_bytes().ct_eq(client_secret.as_bytes());
        (id_ok & secret_ok).unwrap_u8() == 1
    }

    /// Space-separated scope string as used on the wire
    pub fn scope_string(&self) -> String {
        join_scopes(&self.scopes)
    }
}

/// Issued bearer access token record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    /// Unique token identifier (reported as `jti` on introspection)
    pub id: String,

    /// Opaque token value presented by clients
    #[serde(skip_serializing)]
    pub value: String,

    /// Owning username
    pub username: String,

    /// Client the token was issued to
    pub client_id: String,

    /// Granted scopes
    pub scopes: BTreeSet<String>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    /// Refresh token minted together with this access token
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
}

impl AccessToken {
    /// A token is live strictly before `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Remaining lifetime in whole seconds, never negative
    pub fn expires_in_at(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Refresh token record
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub value: String,
    pub username: String,
    pub client_id: String,
    pub scopes: BTreeSet<String>,
    pub issued_at: DateTime<Utc>,
    /// `None` means the refresh token lives as long as the process
    pub expires_at: Option<DateTime<Utc>>,
    /// Access token currently bound to this refresh token
    pub access_token: String,
}

impl RefreshToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Result of a successful grant, shaped like the RFC 6749 token response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Authenticated identity attached to one request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub username: String,
    pub roles: BTreeSet<String>,
    /// Scopes of the bearer token; empty for Basic logins
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    /// Client the bearer token was issued to; `None` for Basic logins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Principal {
    /// Principal for a direct username/password login
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            roles: user.roles.clone(),
            scopes: BTreeSet::new(),
            client_id: None,
        }
    }

    /// Principal for a bearer token owned by `user`
    pub fn from_token(user: &User, token: &AccessToken) -> Self {
        Self {
            username: user.username.clone(),
            roles: user.roles.clone(),
            scopes: token.scopes.clone(),
            client_id: Some(token.client_id.clone()),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// RFC 7662 introspection view of a token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenInfo {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl TokenInfo {
    pub fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            username: None,
            token_type: None,
            exp: None,
            iat: None,
            jti: None,
        }
    }

    pub fn from_token(token: &AccessToken) -> Self {
        Self {
            active: true,
            scope: Some(join_scopes(&token.scopes)),
            client_id: Some(token.client_id.clone()),
            username: Some(token.username.clone()),
            token_type: Some(crate::constants::TOKEN_TYPE_BEARER.to_string()),
            exp: Some(token.expires_at.timestamp()),
            iat: Some(token.issued_at.timestamp()),
            jti: Some(token.id.clone()),
        }
    }
}

/// Join scopes the way OAuth2 puts them on the wire
/// `now + ttl`, saturating at the latest representable instant
pub fn expiry_after(now: DateTime<Utc>, ttl: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn join_scopes(scopes: &BTreeSet<String>) -> String {
    scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

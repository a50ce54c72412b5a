//! Token issuer
//!
//! Validates the configured client and the resource owner, mints opaque
//! bearer tokens and owns the token tables. Nothing else mutates them.
//!
//! Expiry is checked lazily on every lookup; [`TokenIssuer::spawn_cleanup`]
//! only reclaims memory held by tokens nobody presents again.

use super::credentials::CredentialStore;
use crate::constants::{TOKEN_BYTES, TOKEN_TYPE_BEARER};
use crate::error::AuthError;
use crate::model::{
    AccessToken, IssuedToken, Principal, RefreshToken, RegisteredClient, TokenInfo, User,
    expiry_after, join_scopes,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

type AuthResult<T> = std::result::Result<T, AuthError>;

/// Issues and validates bearer tokens for the single configured client
pub struct TokenIssuer {
    client: RegisteredClient,
    credentials: Arc<CredentialStore>,
    access_tokens: DashMap<String, AccessToken>,
    refresh_tokens: DashMap<String, RefreshToken>,
    access_ttl: Duration,
    refresh_ttl: Option<Duration>,
    issue_refresh_tokens: bool,
}

impl TokenIssuer {
    pub fn new(
        client: RegisteredClient,
        credentials: Arc<CredentialStore>,
        access_ttl: Duration,
    ) -> Self {
        Self {
            client,
            credentials,
            access_tokens: DashMap::new(),
            refresh_tokens: DashMap::new(),
            access_ttl,
            refresh_ttl: None,
            issue_refresh_tokens: true,
        }
    }

    /// Lifetime of refresh tokens; `None` keeps them for the process lifetime
    pub fn with_refresh_ttl(mut self, refresh_ttl: Option<Duration>) -> Self {
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn with_refresh_tokens(mut self, enabled: bool) -> Self {
        self.issue_refresh_tokens = enabled;
        self
    }

    pub fn client(&self) -> &RegisteredClient {
        &self.client
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Verify client credentials. Always runs before any user lookup.
    pub fn authenticate_client(&self, client_id: &str, client_secret: &str) -> AuthResult<()> {
        if self.client.authenticate(client_id, client_secret) {
            Ok(())
        } else {
            tracing::warn!(client_id, "client authentication failed");
            Err(AuthError::InvalidClient)
        }
    }

    /// Resource-owner password grant
    pub fn issue_token(
        &self,
        client_id: &str,
        client_secret: &str,
        username: &str,
        password: &str,
    ) -> AuthResult<IssuedToken> {
        self.issue_token_at(client_id, client_secret, username, password, Utc::now())
    }

    pub fn issue_token_at(
        &self,
        client_id: &str,
        client_secret: &str,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        self.authenticate_client(client_id, client_secret)?;

        let Some(user) = self.credentials.verify(username, password) else {
            tracing::warn!(username, "password grant rejected");
            return Err(AuthError::InvalidGrant);
        };

        let refresh_value = self.issue_refresh_tokens.then(generate_token);
        let issued = self.mint(&user, now, refresh_value.clone());
        if let Some(value) = refresh_value {
            self.refresh_tokens.insert(
                value.clone(),
                RefreshToken {
                    value,
                    username: user.username.clone(),
                    client_id: self.client.client_id.clone(),
                    scopes: self.client.scopes.clone(),
                    issued_at: now,
                    expires_at: self.refresh_ttl.map(|ttl| expiry_after(now, ttl)),
                    access_token: issued.access_token.clone(),
                },
            );
        }
        tracing::info!(username, client_id, "access token issued");
        Ok(issued)
    }

    /// Refresh-token grant. The refresh token is reused, the access token
    /// it was bound to is revoked.
    pub fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> AuthResult<IssuedToken> {
        self.refresh_at(client_id, client_secret, refresh_token, Utc::now())
    }

    pub fn refresh_at(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        self.authenticate_client(client_id, client_secret)?;

        // The entry guard serialises concurrent refreshes of one token, so
        // exactly one access token stays bound to it.
        let Some(mut record) = self.refresh_tokens.get_mut(refresh_token) else {
            return Err(AuthError::InvalidGrant);
        };

        if record.client_id != client_id {
            return Err(AuthError::InvalidGrant);
        }
        if record.is_expired_at(now) {
            let (username, bound) = (record.username.clone(), record.access_token.clone());
            drop(record);
            self.refresh_tokens
                .remove_if(refresh_token, |_, r| r.is_expired_at(now));
            self.access_tokens.remove(&bound);
            tracing::debug!(username = %username, "refresh token expired");
            return Err(AuthError::InvalidGrant);
        }

        let user = self
            .credentials
            .lookup(&record.username)
            .ok_or(AuthError::InvalidGrant)?;

        let issued = self.mint(&user, now, Some(record.value.clone()));
        let previous = std::mem::replace(&mut record.access_token, issued.access_token.clone());
        drop(record);

        self.access_tokens.remove(&previous);
        tracing::info!(username = %user.username, client_id, "access token refreshed");
        Ok(issued)
    }

    /// Resolve a bearer token to its principal
    pub fn validate_token(&self, token: &str) -> AuthResult<Principal> {
        self.validate_token_at(token, Utc::now())
    }

    pub fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Principal> {
        let record = self
            .access_tokens
            .get(token)
            .map(|t| t.value().clone())
            .ok_or(AuthError::InvalidToken)?;

        if record.is_expired_at(now) {
            self.access_tokens
                .remove_if(token, |_, t| t.is_expired_at(now));
            tracing::debug!(username = %record.username, "access token expired");
            return Err(AuthError::ExpiredToken);
        }

        // Tokens are only minted for existing users and users are never
        // deleted, so a miss here means the table is corrupt.
        let user = self.credentials.lookup(&record.username).ok_or_else(|| {
            tracing::error!(username = %record.username, "token references unknown user");
            AuthError::InvalidToken
        })?;

        Ok(Principal::from_token(&user, &record))
    }

    /// RFC 7662 view of an access token
    pub fn introspect(&self, token: &str) -> TokenInfo {
        self.introspect_at(token, Utc::now())
    }

    pub fn introspect_at(&self, token: &str, now: DateTime<Utc>) -> TokenInfo {
        match self.access_tokens.get(token) {
            Some(record) if !record.is_expired_at(now) => TokenInfo::from_token(record.value()),
            _ => TokenInfo::inactive(),
        }
    }

    /// Revoke an access or refresh token. Returns whether anything was removed.
    pub fn revoke(&self, token: &str) -> bool {
        if let Some((_, access)) = self.access_tokens.remove(token) {
            tracing::info!(username = %access.username, "access token revoked");
            return true;
        }
        if let Some((_, refresh)) = self.refresh_tokens.remove(token) {
            self.access_tokens.remove(&refresh.access_token);
            tracing::info!(username = %refresh.username, "refresh token revoked");
            return true;
        }
        false
    }

    /// Drop expired records, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.access_tokens.len() + self.refresh_tokens.len();
        self.access_tokens.retain(|_, t| !t.is_expired_at(now));
        self.refresh_tokens.retain(|_, t| !t.is_expired_at(now));
        before.saturating_sub(self.access_tokens.len() + self.refresh_tokens.len())
    }

    /// Periodically purge expired tokens until the runtime shuts down
    pub fn spawn_cleanup(self: &Arc<Self>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let issuer = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let removed = issuer.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, "purged expired tokens");
                }
            }
        })
    }

    pub fn active_tokens(&self) -> usize {
        self.access_tokens.len()
    }

    /// Mint and store a new access token for `user`, bound to `refresh_value`
    fn mint(&self, user: &User, now: DateTime<Utc>, refresh_value: Option<String>) -> IssuedToken {
        let access_value = generate_token();
        let scopes = self.client.scopes.clone();

        let token = AccessToken {
            id: Uuid::new_v4().to_string(),
            value: access_value.clone(),
            username: user.username.clone(),
            client_id: self.client.client_id.clone(),
            scopes,
            issued_at: now,
            expires_at: expiry_after(now, self.access_ttl),
            refresh_token: refresh_value.clone(),
        };
        let expires_in = token.expires_in_at(now);
        let scope = join_scopes(&token.scopes);
        self.access_tokens.insert(access_value.clone(), token);

        IssuedToken {
            access_token: access_value,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in,
            refresh_token: refresh_value,
            scope: (!scope.is_empty()).then_some(scope),
        }
    }
}

/// Generate an opaque token (using cryptographically secure RNG)
pub fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

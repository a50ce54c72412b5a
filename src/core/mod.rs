//! Process-wide dependencies
//!
//! Everything the HTTP layer needs is built once here from the config and
//! handed to the router as state. There are no global singletons.

use crate::auth::{AccessPolicy, CredentialStore, RequestAuthenticator, TokenIssuer};
use crate::config::Config;
use crate::model::RegisteredClient;
use crate::{Result, SsoError};
use chrono::TimeDelta;
use std::sync::Arc;

/// Shared state of the auth server
#[derive(Clone)]
pub struct Dependencies {
    pub config: Arc<Config>,
    pub credentials: Arc<CredentialStore>,
    pub issuer: Arc<TokenIssuer>,
    pub authenticator: RequestAuthenticator,
    pub policy: Arc<AccessPolicy>,
}

/// Build the stores from config and seed the configured accounts
pub fn create_dependencies(config: &Config) -> Result<Dependencies> {
    let credentials = Arc::new(CredentialStore::new());
    for user in &config.users {
        let outcome =
            credentials.create_with_roles(&user.username, &user.password, user.roles.clone())?;
        tracing::debug!(username = %user.username, created = outcome.is_created(), "seed user");
    }

    let oauth = &config.oauth;
    let client = RegisteredClient::new(
        oauth.client_id.clone(),
        oauth.client_secret.clone(),
        oauth.scopes.clone(),
    );
    let access_ttl = ttl_from_secs(oauth.access_token_ttl_secs, "accessTokenTtlSecs")?;
    let refresh_ttl = oauth
        .refresh_token_ttl_secs
        .map(|secs| ttl_from_secs(secs, "refreshTokenTtlSecs"))
        .transpose()?;
    let issuer = Arc::new(
        TokenIssuer::new(client, credentials.clone(), access_ttl)
            .with_refresh_ttl(refresh_ttl)
            .with_refresh_tokens(oauth.issue_refresh_tokens),
    );

    let authenticator = RequestAuthenticator::new(credentials.clone(), issuer.clone());

    Ok(Dependencies {
        config: Arc::new(config.clone()),
        credentials,
        issuer,
        authenticator,
        policy: Arc::new(AccessPolicy::standard()),
    })
}

fn ttl_from_secs(secs: i64, name: &str) -> Result<TimeDelta> {
    TimeDelta::try_seconds(secs)
        .ok_or_else(|| SsoError::config(format!("oauth.{} is out of range", name)))
}

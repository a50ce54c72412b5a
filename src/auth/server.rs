//! OAuth2 endpoints of the authorization server
//!
//! Token issuance (password and refresh grants), RFC 7662 introspection,
//! RFC 7009 revocation and RFC 8414 metadata. These routes are public at the
//! HTTP layer; every handler authenticates the client itself.

use super::authenticator::client_credentials;
use super::issuer::TokenIssuer;
use crate::constants::{
    GRANT_TYPE_PASSWORD, GRANT_TYPE_REFRESH_TOKEN, PATH_INTROSPECT, PATH_METADATA, PATH_REVOKE,
    PATH_TOKEN,
};
use crate::error::AuthError;
use crate::http::{AppError, blocking, form_body};
use crate::model::{IssuedToken, join_scopes};
use crate::SsoError;
use axum::{
    Form, Json, Router,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// OAuth endpoint state
pub struct OAuthServerState {
    pub issuer: Arc<TokenIssuer>,
    /// Public base URL advertised in the metadata document
    pub issuer_url: String,
}

impl OAuthServerState {
    pub fn new(issuer: Arc<TokenIssuer>, issuer_url: impl Into<String>) -> Self {
        Self {
            issuer,
            issuer_url: issuer_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Token endpoint form (RFC 6749 sections 4.3 and 6)
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Form shared by introspection and revocation
#[derive(Debug, Default, Deserialize)]
pub struct TokenParam {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Create OAuth routes
pub fn create_oauth_routes(state: Arc<OAuthServerState>) -> Router {
    Router::new()
        .route(PATH_METADATA, get(handle_metadata_discovery))
        .route(PATH_TOKEN, post(handle_token))
        .route(PATH_INTROSPECT, post(handle_token_introspection))
        .route(PATH_REVOKE, post(handle_token_revocation))
        .with_state(state)
}

async fn handle_metadata_discovery(State(state): State<Arc<OAuthServerState>>) -> Json<Value> {
    let base = &state.issuer_url;
    Json(json!({
        "issuer": base,
        "token_endpoint": format!("{}{}", base, PATH_TOKEN),
        "introspection_endpoint": format!("{}{}", base, PATH_INTROSPECT),
        "revocation_endpoint": format!("{}{}", base, PATH_REVOKE),
        "grant_types_supported": [GRANT_TYPE_PASSWORD, GRANT_TYPE_REFRESH_TOKEN],
        "token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"],
        "scopes_supported": state.issuer.client().scopes.iter().collect::<Vec<_>>(),
    }))
}

/// Handle the token endpoint
async fn handle_token(
    State(state): State<Arc<OAuthServerState>>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<Response, AppError> {
    let req = form_body(form)?;
    let (client_id, client_secret) = client_credentials(
        &headers,
        req.client_id.as_deref(),
        req.client_secret.as_deref(),
    )?;
    state.issuer.authenticate_client(&client_id, &client_secret)?;

    if let Some(scope) = req.scope.as_deref() {
        check_requested_scope(&state.issuer, scope)?;
    }

    let issued = match req.grant_type.as_deref() {
        Some(GRANT_TYPE_PASSWORD) => {
            let username = required(req.username.as_deref(), "username")?.to_string();
            let password = required(req.password.as_deref(), "password")?.to_string();
            let issuer = state.issuer.clone();
            blocking(move || issuer.issue_token(&client_id, &client_secret, &username, &password))
                .await?
        }
        Some(GRANT_TYPE_REFRESH_TOKEN) => {
            let refresh_token = required(req.refresh_token.as_deref(), "refresh_token")?;
            state
                .issuer
                .refresh(&client_id, &client_secret, refresh_token)?
        }
        Some(other) => return Err(AuthError::UnsupportedGrantType(other.to_string()).into()),
        None => return Err(SsoError::validation("missing grant_type").into()),
    };

    Ok(token_response(issued))
}

/// Token responses must not be cached (RFC 6749 section 5.1)
fn token_response(issued: IssuedToken) -> Response {
    let mut response = Json(issued).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, SsoError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SsoError::validation(format!("missing {}", name))),
    }
}

/// Scopes can only be narrowed to what the client holds
fn check_requested_scope(issuer: &TokenIssuer, scope: &str) -> Result<(), AuthError> {
    let allowed = &issuer.client().scopes;
    let unknown: Vec<&str> = scope
        .split_whitespace()
        .filter(|s| !allowed.contains(*s))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(AuthError::InvalidScope(format!(
            "'{}' (client holds '{}')",
            unknown.join(" "),
            join_scopes(allowed)
        )))
    }
}

/// Handle token revocation (RFC 7009)
async fn handle_token_revocation(
    State(state): State<Arc<OAuthServerState>>,
    headers: HeaderMap,
    form: Result<Form<TokenParam>, FormRejection>,
) -> Result<Json<Value>, AppError> {
    let params = form_body(form)?;
    let (client_id, client_secret) = client_credentials(
        &headers,
        params.client_id.as_deref(),
        params.client_secret.as_deref(),
    )?;
    state.issuer.authenticate_client(&client_id, &client_secret)?;
    let token = required(params.token.as_deref(), "token")?;

    // Unknown tokens are not an error
    let revoked = state.issuer.revoke(token);
    tracing::debug!(revoked, "revocation request handled");
    Ok(Json(json!({})))
}

/// Handle token introspection (RFC 7662)
async fn handle_token_introspection(
    State(state): State<Arc<OAuthServerState>>,
    headers: HeaderMap,
    form: Result<Form<TokenParam>, FormRejection>,
) -> Result<Response, AppError> {
    let params = form_body(form)?;
    let (client_id, client_secret) = client_credentials(
        &headers,
        params.client_id.as_deref(),
        params.client_secret.as_deref(),
    )?;
    state.issuer.authenticate_client(&client_id, &client_secret)?;
    let token = required(params.token.as_deref(), "token")?;

    Ok(Json(state.issuer.introspect(token)).into_response())
}

//! Request authentication
//!
//! Classifies the `Authorization` header and resolves it to a principal:
//! - `Basic` credentials are checked against the credential store directly
//!   (only `/login` accepts them)
//! - `Bearer` tokens are delegated to the token issuer
//! - no header means an anonymous request

use super::credentials::CredentialStore;
use super::issuer::TokenIssuer;
use crate::constants::{SCHEME_BASIC, SCHEME_BEARER};
use crate::error::AuthError;
use crate::model::Principal;
use axum::http::{HeaderMap, header};
use base64::Engine;
use std::sync::Arc;

/// Credentials carried by one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
    Anonymous,
}

/// Outcome of authenticating a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Anonymous,
    Authenticated(Principal),
}

impl Authentication {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Authentication::Authenticated(p) => Some(p),
            Authentication::Anonymous => None,
        }
    }
}

/// Parse the `Authorization` header without checking the credentials
pub fn parse_authorization(headers: &HeaderMap) -> Result<Credentials, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Credentials::Anonymous);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader("header is not visible ASCII".to_string()))?
        .trim();

    let (scheme, rest) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::MalformedHeader("missing credentials after scheme".to_string()))?;
    let rest = rest.trim();

    if scheme.eq_ignore_ascii_case(SCHEME_BASIC) {
        let (username, password) = decode_basic(rest)?;
        Ok(Credentials::Basic { username, password })
    } else if scheme.eq_ignore_ascii_case(SCHEME_BEARER) {
        if rest.is_empty() || !is_b64token(rest) {
            return Err(AuthError::MalformedHeader(
                "bearer token has invalid characters".to_string(),
            ));
        }
        Ok(Credentials::Bearer(rest.to_string()))
    } else {
        Err(AuthError::MalformedHeader(format!(
            "unsupported scheme '{}'",
            scheme
        )))
    }
}

fn decode_basic(encoded: &str) -> Result<(String, String), AuthError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AuthError::MalformedHeader("basic credentials are not base64".to_string()))?;
    let decoded = String::from_utf8(bytes)
        .map_err(|_| AuthError::MalformedHeader("basic credentials are not UTF-8".to_string()))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| AuthError::MalformedHeader("basic credentials lack ':'".to_string()))?;
    Ok((username.to_string(), password.to_string()))
}

/// RFC 6750 `b64token` character set
fn is_b64token(token: &str) -> bool {
    let body = token.trim_end_matches('=');
    !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '+' | '/'))
}

/// Client credentials for the OAuth endpoints.
///
/// `client_secret_basic` wins over `client_secret_post`. Basic components
/// are form-url-decoded as RFC 6749 section 2.3.1 requires.
pub fn client_credentials(
    headers: &HeaderMap,
    form_client_id: Option<&str>,
    form_client_secret: Option<&str>,
) -> Result<(String, String), AuthError> {
    match parse_authorization(headers) {
        Ok(Credentials::Basic { username, password }) => {
            Ok((form_url_decode(&username)?, form_url_decode(&password)?))
        }
        Ok(Credentials::Anonymous) => match (form_client_id, form_client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() => Ok((id.to_string(), secret.to_string())),
            _ => Err(AuthError::InvalidClient),
        },
        Ok(Credentials::Bearer(_)) | Err(_) => Err(AuthError::InvalidClient),
    }
}

fn form_url_decode(value: &str) -> Result<String, AuthError> {
    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|_| AuthError::InvalidClient)
}

/// Resolves request credentials against the credential store and issuer
#[derive(Clone)]
pub struct RequestAuthenticator {
    credentials: Arc<CredentialStore>,
    issuer: Arc<TokenIssuer>,
}

impl RequestAuthenticator {
    pub fn new(credentials: Arc<CredentialStore>, issuer: Arc<TokenIssuer>) -> Self {
        Self {
            credentials,
            issuer,
        }
    }

    /// Authenticate whatever the request carries
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Authentication, AuthError> {
        match parse_authorization(headers)? {
            Credentials::Anonymous => Ok(Authentication::Anonymous),
            Credentials::Basic { username, password } => self
                .check_password(&username, &password)
                .map(Authentication::Authenticated),
            Credentials::Bearer(token) => self
                .issuer
                .validate_token(&token)
                .map(Authentication::Authenticated),
        }
    }

    /// Resource access: only a valid bearer token is accepted
    pub fn authenticate_bearer(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        match parse_authorization(headers)? {
            Credentials::Bearer(token) => self.issuer.validate_token(&token),
            Credentials::Basic { .. } | Credentials::Anonymous => Err(AuthError::Unauthenticated),
        }
    }

    /// Demo login: only Basic credentials are accepted
    pub fn authenticate_basic(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        match parse_authorization(headers)? {
            Credentials::Basic { username, password } => self.check_password(&username, &password),
            Credentials::Bearer(_) | Credentials::Anonymous => Err(AuthError::Unauthenticated),
        }
    }

    /// Verify a username/password pair directly
    pub fn check_password(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        self.credentials
            .verify(username, password)
            .map(|user| Principal::from_user(&user))
            .ok_or_else(|| {
                tracing::warn!(username, "basic authentication failed");
                AuthError::Unauthenticated
            })
    }
}

//! Error types for ssogate
//!
//! One top-level error with domain sub-enums, all built on thiserror.
//! Every failure converts into `SsoError` so handlers can use `?` and let
//! `http::AppError` pick the status code.

use thiserror::Error;

/// Main error type for ssogate operations
#[derive(Error, Debug)]
pub enum SsoError {
    /// Missing or malformed request parameter (MALFORMED_REQUEST)
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// A blocking task (password hashing) panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Authentication and authorization failures.
///
/// Each variant maps onto one OAuth2 / RFC 6750 error code, see
/// [`AuthError::oauth_code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown client or wrong client secret
    #[error("client authentication failed")]
    InvalidClient,

    /// Unknown user, wrong password, or unknown/expired refresh token
    #[error("bad resource owner credentials")]
    InvalidGrant,

    /// Unknown bearer token
    #[error("access token is not recognised")]
    InvalidToken,

    /// Bearer token past its expiry
    #[error("access token expired")]
    ExpiredToken,

    /// No usable credentials on a route that requires them
    #[error("full authentication is required to access this resource")]
    Unauthenticated,

    /// `Authorization` header present but unparseable
    #[error("malformed Authorization header: {0}")]
    MalformedHeader(String),

    #[error("unsupported grant_type: {0}")]
    UnsupportedGrantType(String),

    /// Requested scope exceeds what the client may receive
    #[error("scope not allowed: {0}")]
    InvalidScope(String),
}

impl AuthError {
    /// OAuth2 `error` code reported in JSON bodies
    pub fn oauth_code(&self) -> &'static str {
        match self {
            AuthError::InvalidClient => "invalid_client",
            AuthError::InvalidGrant => "invalid_grant",
            AuthError::InvalidToken | AuthError::ExpiredToken => "invalid_token",
            AuthError::Unauthenticated => "unauthorized",
            AuthError::MalformedHeader(_) => "invalid_request",
            AuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            AuthError::InvalidScope(_) => "invalid_scope",
        }
    }
}

/// Outbound HTTP errors (UI service and test client)
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Remote answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Convenient result type for ssogate operations
pub type Result<T> = std::result::Result<T, SsoError>;

impl SsoError {
    /// Create a validation error
    #[inline]
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        SsoError::Validation(msg.into())
    }

    /// Create a config error
    #[inline]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SsoError::Config(msg.into())
    }

    /// Create a not found error
    #[inline]
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        SsoError::NotFound(msg.into())
    }

    /// Returns the authentication failure, if this is one
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            SsoError::Auth(e) => Some(e),
            _ => None,
        }
    }
}

impl From<url::ParseError> for SsoError {
    fn from(err: url::ParseError) -> Self {
        SsoError::Network(NetworkError::InvalidUrl(err.to_string()))
    }
}

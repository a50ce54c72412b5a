//! HTTP response helpers
//!
//! Every error leaves the server as an OAuth2-style body
//! `{"error": code, "error_description": message}`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// OAuth2 error body (RFC 6749 section 5.2)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Write an OAuth2 error response
pub fn write_oauth_error(status: StatusCode, code: &str, description: impl Into<String>) -> Response {
    let description = description.into();
    let body = OAuthErrorBody {
        error: code.to_string(),
        error_description: (!description.is_empty()).then_some(description),
    };
    (status, Json(body)).into_response()
}

/// Attach a `WWW-Authenticate` challenge to a response
pub fn with_challenge(mut response: Response, challenge: &str) -> Response {
    match HeaderValue::from_str(challenge) {
        Ok(value) => {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        Err(e) => tracing::error!("Invalid WWW-Authenticate challenge: {}", e),
    }
    response
}

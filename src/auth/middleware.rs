//! Access-policy enforcement and the principal extractor
//!
//! `enforce_access_policy` runs once per request in front of every route,
//! fallback included. Authenticated requests carry their [`Principal`] in
//! the request extensions, where handlers pick it up by extracting it.

use super::authenticator::{Authentication, RequestAuthenticator};
use super::policy::{Access, AccessPolicy, Mechanism};
use crate::error::AuthError;
use crate::http::AppError;
use crate::model::Principal;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// State for the policy middleware
#[derive(Clone)]
pub struct PolicyState {
    pub policy: Arc<AccessPolicy>,
    pub authenticator: RequestAuthenticator,
}

impl PolicyState {
    pub fn new(policy: Arc<AccessPolicy>, authenticator: RequestAuthenticator) -> Self {
        Self {
            policy,
            authenticator,
        }
    }

    /// Decide whether the request may proceed, resolving its principal
    pub fn check(&self, path: &str, headers: &axum::http::HeaderMap) -> Result<Option<Principal>, AuthError> {
        let rule = self.policy.evaluate(path);
        match (rule.access, rule.mechanism) {
            (Access::Public, _) => Ok(None),
            (Access::Authenticated, Mechanism::Bearer) => {
                self.authenticator.authenticate_bearer(headers).map(Some)
            }
            (Access::Authenticated, _) => match self.authenticator.authenticate(headers)? {
                Authentication::Authenticated(principal) => Ok(Some(principal)),
                Authentication::Anonymous => Err(AuthError::Unauthenticated),
            },
        }
    }
}

/// Middleware applying the access policy to every request
pub async fn enforce_access_policy(
    State(state): State<PolicyState>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();

    match state.check(&path, req.headers()) {
        Ok(Some(principal)) => {
            tracing::debug!(path = %path, username = %principal.username, "request authenticated");
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Ok(None) => next.run(req).await,
        Err(err) => {
            tracing::debug!(path = %path, error = %err, "request rejected by access policy");
            AppError::from(err).into_response()
        }
    }
}

/// Extractor for the principal resolved by [`enforce_access_policy`]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| AppError::from(AuthError::Unauthenticated))
    }
}

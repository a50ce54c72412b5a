//! Session management for the UI service
//!
//! In-memory sessions with TTL and a CSRF token per session. A session
//! starts anonymous when the login form is shown and carries the bearer
//! token once the password grant succeeds.

use axum::http::request::Parts;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::UI_SESSION_COOKIE;
use crate::auth::generate_token;
use crate::model::expiry_after;

/// Session data stored for each browser
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session ID (cookie value)
    pub id: String,
    /// CSRF token embedded in the login form
    pub csrf_token: String,
    /// Set once the password grant succeeded
    pub login: Option<SessionLogin>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Token obtained from the auth server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLogin {
    pub username: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session store for managing browser sessions
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an anonymous session with a fresh CSRF token
    pub fn create_session(&self, ttl: Duration) -> Session {
        let now = Utc::now();
        let session = Session {
            id: generate_token(),
            csrf_token: generate_token(),
            login: None,
            created_at: now,
            expires_at: expiry_after(now, ttl),
        };

        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        session
    }

    /// Get a live session by ID
    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read();
            let session = sessions.get(session_id)?;
            if !session.is_expired_at(now) {
                return Some(session.clone());
            }
        }

        self.sessions.write().remove(session_id);
        None
    }

    /// Attach a login to the session, replacing its ID so a pre-login
    /// cookie can never be reused as an authenticated one
    pub fn promote(&self, session_id: &str, login: SessionLogin, ttl: Duration) -> Option<Session> {
        let mut sessions = self.sessions.write();
        let old = sessions.remove(session_id)?;
        if old.is_expired_at(Utc::now()) {
            return None;
        }

        let now = Utc::now();
        let session = Session {
            id: generate_token(),
            csrf_token: generate_token(),
            login: Some(login),
            created_at: now,
            expires_at: expiry_after(now, ttl),
        };
        sessions.insert(session.id.clone(), session.clone());
        Some(session)
    }

    /// Delete a session
    pub fn delete_session(&self, session_id: &str) {
        self.sessions.write().remove(session_id);
    }

    /// Validate a CSRF token for a session (constant-time)
    pub fn validate_csrf_token(&self, session_id: &str, token: &str) -> bool {
        use subtle::ConstantTimeEq;

        let sessions = self.sessions.read();
        match sessions.get(session_id) {
            Some(session) if !session.is_expired_at(Utc::now()) => {
                session.csrf_token.as_bytes().ct_eq(token.as_bytes()).unwrap_u8() == 1
            }
            _ => false,
        }
    }

    /// Drop expired sessions, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        before - sessions.len()
    }

    /// Periodically drop expired sessions
    pub fn spawn_cleanup(&self, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let removed = store.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed, "purged expired UI sessions");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

/// Session ID extracted from cookie
#[derive(Clone, Debug)]
pub struct SessionId(pub String);

/// Read the session cookie from request headers
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .map(str::trim)
        .find_map(|c| {
            c.strip_prefix(UI_SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Middleware that puts the session ID and the store into request extensions
pub async fn session_middleware(
    State(store): State<SessionStore>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(session_id) = session_id_from_headers(req.headers()) {
        req.extensions_mut().insert(SessionId(session_id));
    }
    req.extensions_mut().insert(store);
    next.run(req).await
}

/// Extractor for the live session, if any
pub struct SessionExtractor {
    pub session: Option<Session>,
}

impl<S> FromRequestParts<S> for SessionExtractor
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session_id = parts.extensions.get::<SessionId>();
        let store = parts.extensions.get::<SessionStore>();

        let session = match (session_id, store) {
            (Some(sid), Some(store)) => store.get_session(&sid.0),
            _ => None,
        };
        Ok(SessionExtractor { session })
    }
}

/// Set a session cookie in the response with security flags
pub fn set_session_cookie(session_id: &str, expires_at: DateTime<Utc>, secure: bool) -> String {
    let secure_flag = if secure { " Secure;" } else { "" };
    format!(
        "{}={}; Path=/; Expires={}; HttpOnly;{} SameSite=Lax",
        UI_SESSION_COOKIE,
        session_id,
        expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        secure_flag
    )
}

/// Clear the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    let secure_flag = if secure { " Secure;" } else { "" };
    format!(
        "{}=; Path=/; Max-Age=0; HttpOnly;{} SameSite=Lax",
        UI_SESSION_COOKIE, secure_flag
    )
}

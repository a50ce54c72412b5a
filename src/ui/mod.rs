//! UI service relying on the auth server
//!
//! Shows a login form, trades the submitted credentials for a bearer token
//! with the password grant, keeps the token in a server-side session and
//! renders whatever `/whois` says about it.

pub mod session;

use self::session::{
    SessionExtractor, SessionLogin, SessionStore, clear_session_cookie, session_middleware,
    set_session_cookie,
};
use crate::client::{self, RestCall};
use crate::config::{Config, UiConfig};
use crate::constants::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_CLEANUP_INTERVAL_SECS, PATH_REVOKE, PATH_TOKEN,
    PATH_WHOIS, UI_LOGIN_SESSION_TTL_SECS,
};
use crate::error::NetworkError;
use crate::http::template::{self, TemplateRenderer};
use crate::model::Principal;
use crate::{Result, SsoError};
use axum::{
    Form, Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::Duration;
use oauth2::basic::BasicClient;
use oauth2::{
    ClientId, ClientSecret, RequestTokenError, ResourceOwnerPassword, ResourceOwnerUsername,
    TokenResponse, TokenUrl,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    LatencyUnit,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// UI service state
#[derive(Clone)]
pub struct UiState {
    config: Arc<UiConfig>,
    sessions: SessionStore,
    templates: Arc<TemplateRenderer>,
    http: reqwest::Client,
}

impl UiState {
    pub fn new(config: UiConfig) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            sessions: SessionStore::new(),
            templates: Arc::new(TemplateRenderer::new()?),
            http: client::http_client()?,
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    fn auth_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.auth_server_url.trim_end_matches('/'),
            path
        )
    }
}

/// Start the UI service
pub async fn start_ui(config: &Config) -> Result<()> {
    let ui = config.ui.clone();
    let addr = format!("{}:{}", ui.host, ui.port);
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| SsoError::config(format!("Invalid address {}: {}", addr, e)))?;

    let state = UiState::new(ui)?;
    state
        .sessions
        .spawn_cleanup(std::time::Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS));

    let listener = tokio::net::TcpListener::bind(socket_addr).await?;
    tracing::info!(
        "UI service listening on http://{} (auth server {})",
        socket_addr,
        state.config.auth_server_url
    );
    axum::serve(listener, build_ui_router(state))
        .await
        .map_err(|e| SsoError::config(format!("Server error: {}", e)))?;
    Ok(())
}

/// Build the UI router
pub fn build_ui_router(state: UiState) -> Router {
    let sessions = state.sessions.clone();
    Router::new()
        .route("/", get(identity_handler))
        .route("/login", get(login_form_handler).post(login_handler))
        .route("/logout", post(logout_handler))
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            sessions,
            session_middleware,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(
                    DefaultOnResponse::new()
                        .level(tracing::Level::INFO)
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
}

/// `GET /`: identity page, or a redirect to the login form
async fn identity_handler(
    State(state): State<UiState>,
    SessionExtractor { session }: SessionExtractor,
) -> Response {
    let Some((session_id, login)) = session.and_then(|s| s.login.map(|l| (s.id, l))) else {
        return Redirect::to("/login").into_response();
    };

    let call = RestCall::get(state.auth_url(PATH_WHOIS)).bearer(&login.access_token);
    match client::execute::<Principal>(&state.http, &call).await {
        Ok(principal) => render(
            &state,
            StatusCode::OK,
            template::UI_IDENTITY,
            json!({ "username": principal.username, "roles": principal.roles }),
        ),
        Err(SsoError::Network(NetworkError::Status { status: 401, .. })) => {
            tracing::info!(username = %login.username, "token no longer accepted, logging out");
            state.sessions.delete_session(&session_id);
            with_cookie(
                Redirect::to("/login").into_response(),
                &clear_session_cookie(state.config.secure_cookies),
            )
        }
        Err(e) => {
            tracing::error!("whois call failed: {}", e);
            (StatusCode::BAD_GATEWAY, "Auth server unavailable").into_response()
        }
    }
}

/// `GET /login`: form bound to a fresh pre-login session
async fn login_form_handler(State(state): State<UiState>) -> Response {
    login_page(&state, StatusCode::OK, None)
}

fn login_page(state: &UiState, status: StatusCode, error: Option<&str>) -> Response {
    let session = state
        .sessions
        .create_session(Duration::seconds(UI_LOGIN_SESSION_TTL_SECS));
    let page = render(
        state,
        status,
        template::UI_LOGIN,
        json!({ "action": "/login", "csrf_token": session.csrf_token, "error": error }),
    );
    with_cookie(
        page,
        &set_session_cookie(&session.id, session.expires_at, state.config.secure_cookies),
    )
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    csrf_token: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// `POST /login`: CSRF check, password grant, session promotion
async fn login_handler(
    State(state): State<UiState>,
    SessionExtractor { session }: SessionExtractor,
    Form(form): Form<LoginForm>,
) -> Response {
    let Some(session) = session else {
        return login_page(&state, StatusCode::FORBIDDEN, Some("Your session expired, please try again"));
    };
    if !state
        .sessions
        .validate_csrf_token(&session.id, &form.csrf_token)
    {
        tracing::warn!("CSRF validation failed on UI login");
        state.sessions.delete_session(&session.id);
        return login_page(&state, StatusCode::FORBIDDEN, Some("Your session expired, please try again"));
    }

    match password_grant(&state, &form.username, &form.password).await {
        Ok(Some((login, ttl))) => {
            let username = login.username.clone();
            let Some(promoted) = state.sessions.promote(&session.id, login, ttl) else {
                return login_page(&state, StatusCode::FORBIDDEN, Some("Your session expired, please try again"));
            };
            tracing::info!(username = %username, "UI login succeeded");
            with_cookie(
                Redirect::to("/").into_response(),
                &set_session_cookie(&promoted.id, promoted.expires_at, state.config.secure_cookies),
            )
        }
        Ok(None) => {
            state.sessions.delete_session(&session.id);
            login_page(&state, StatusCode::UNAUTHORIZED, Some("Bad credentials"))
        }
        Err(e) => {
            tracing::error!("password grant failed: {}", e);
            (StatusCode::BAD_GATEWAY, "Auth server unavailable").into_response()
        }
    }
}

/// `POST /logout`: drop the session and revoke its token
async fn logout_handler(
    State(state): State<UiState>,
    SessionExtractor { session }: SessionExtractor,
) -> Response {
    if let Some(session) = session {
        state.sessions.delete_session(&session.id);
        if let Some(login) = session.login {
            let call = RestCall::post(state.auth_url(PATH_REVOKE))
                .client_basic(&state.config.client_id, &state.config.client_secret)
                .param("token", login.refresh_token.unwrap_or(login.access_token));
            if let Err(e) = client::execute::<serde_json::Value>(&state.http, &call).await {
                tracing::warn!("token revocation failed: {}", e);
            }
        }
    }

    with_cookie(
        Redirect::to("/login").into_response(),
        &clear_session_cookie(state.config.secure_cookies),
    )
}

/// Trade username and password for a token. `Ok(None)` means the auth
/// server rejected the credentials.
async fn password_grant(
    state: &UiState,
    username: &str,
    password: &str,
) -> Result<Option<(SessionLogin, Duration)>> {
    // Can't be built once and stored: the typestate changes with every setter
    let oauth = BasicClient::new(ClientId::new(state.config.client_id.clone()))
        .set_client_secret(ClientSecret::new(state.config.client_secret.clone()))
        .set_token_uri(
            TokenUrl::new(state.auth_url(PATH_TOKEN))
                .map_err(|e| NetworkError::InvalidUrl(e.to_string()))?,
        );

    let result = oauth
        .exchange_password(
            &ResourceOwnerUsername::new(username.to_string()),
            &ResourceOwnerPassword::new(password.to_string()),
        )
        .request_async(&state.http)
        .await;

    match result {
        Ok(token) => {
            let ttl = token
                .expires_in()
                .and_then(|d| Duration::from_std(d).ok())
                .unwrap_or_else(|| Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS));
            let login = SessionLogin {
                username: username.to_string(),
                access_token: token.access_token().secret().clone(),
                refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            };
            Ok(Some((login, ttl)))
        }
        Err(RequestTokenError::ServerResponse(err)) => {
            tracing::warn!(username, error = %err.error(), "auth server rejected login");
            Ok(None)
        }
        Err(e) => Err(NetworkError::TokenExchange(e.to_string()).into()),
    }
}

fn render(state: &UiState, status: StatusCode, name: &str, data: serde_json::Value) -> Response {
    match state.templates.render_json(name, &data) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Failed to render template '{}': {}", name, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Invalid cookie header: {}", e),
    }
    response
}

#[cfg(test)]
mod session_test;

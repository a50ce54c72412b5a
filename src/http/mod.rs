//! HTTP server for ssogate
//!
//! Registration, demo login, the protected `/whois` resource and the OAuth2
//! endpoints, all behind one access-policy layer.

pub mod response;
pub mod template;

use crate::auth::{OAuthServerState, PolicyState, create_oauth_routes, enforce_access_policy};
use crate::config::{Config, HttpConfig};
use crate::constants::{
    PATH_HEALTH, PATH_LOGIN, PATH_REGISTER, PATH_REGISTRATION_FORM, PATH_WHOIS,
};
use crate::core::{Dependencies, create_dependencies};
use crate::error::AuthError;
use crate::model::Principal;
use crate::{Result, SsoError};
use axum::{
    Form, Json, Router,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    LatencyUnit,
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    deps: Dependencies,
    template_renderer: Arc<template::TemplateRenderer>,
}

/// Error type for HTTP handlers
#[derive(Debug)]
pub struct AppError(SsoError);

impl AppError {
    pub fn inner(&self) -> &SsoError {
        &self.0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, challenge) = match &self.0 {
            SsoError::Auth(auth) => {
                let (status, challenge) = match auth {
                    AuthError::InvalidClient => (
                        StatusCode::UNAUTHORIZED,
                        Some("Basic realm=\"ssogate\"".to_string()),
                    ),
                    AuthError::InvalidToken | AuthError::ExpiredToken => (
                        StatusCode::UNAUTHORIZED,
                        Some(format!(
                            "Bearer realm=\"ssogate\", error=\"invalid_token\", error_description=\"{}\"",
                            auth
                        )),
                    ),
                    AuthError::Unauthenticated => (
                        StatusCode::UNAUTHORIZED,
                        Some("Bearer realm=\"ssogate\"".to_string()),
                    ),
                    AuthError::MalformedHeader(_) => (StatusCode::UNAUTHORIZED, None),
                    AuthError::InvalidGrant
                    | AuthError::UnsupportedGrantType(_)
                    | AuthError::InvalidScope(_) => (StatusCode::BAD_REQUEST, None),
                };
                (status, auth.oauth_code(), auth.to_string(), challenge)
            }
            SsoError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone(), None)
            }
            SsoError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            _ => {
                // Log full error details internally
                tracing::error!("Internal error: {:?}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        tracing::debug!(
            error = code,
            status = %status,
            message = %message,
            "HTTP request error response"
        );

        let response = response::write_oauth_error(status, code, message);
        match challenge {
            Some(challenge) => response::with_challenge(response, &challenge),
            None => response,
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<SsoError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Start the auth server
pub async fn start_server(config: Config) -> Result<()> {
    let deps = create_dependencies(&config)?;

    let interval = config.oauth.cleanup_interval_secs;
    if interval > 0 {
        deps.issuer
            .spawn_cleanup(std::time::Duration::from_secs(interval));
    }

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| SsoError::config(format!("Invalid address {}: {}", addr, e)))?;

    let listener = tokio::net::TcpListener::bind(socket_addr).await?;
    tracing::info!(
        "Auth server listening on http://{}{}",
        socket_addr,
        config.base_path()
    );
    serve(listener, deps).await
}

/// Serve the auth server on an already bound listener
pub async fn serve(listener: tokio::net::TcpListener, deps: Dependencies) -> Result<()> {
    let app = build_router(deps)?;
    axum::serve(listener, app)
        .await
        .map_err(|e| SsoError::config(format!("Server error: {}", e)))?;
    Ok(())
}

/// Build the router with all endpoints
pub fn build_router(deps: Dependencies) -> Result<Router> {
    let config = deps.config.clone();
    let state = AppState {
        deps: deps.clone(),
        template_renderer: Arc::new(template::TemplateRenderer::new()?),
    };

    let oauth_server_state = Arc::new(OAuthServerState::new(
        deps.issuer.clone(),
        config.issuer_url(),
    ));
    let policy_state = PolicyState::new(deps.policy.clone(), deps.authenticator.clone());

    // The policy layer goes on after the fallback so unknown paths are covered
    let routes = Router::new()
        .route(PATH_REGISTER, axum::routing::post(register_handler))
        .route(PATH_REGISTRATION_FORM, get(registration_form_handler))
        .route(PATH_LOGIN, get(login_form_handler).post(login_handler))
        .route(PATH_WHOIS, get(whois_handler))
        .route(PATH_HEALTH, get(health_handler))
        .with_state(state)
        .merge(create_oauth_routes(oauth_server_state))
        .fallback(not_found_handler)
        .layer(axum::middleware::from_fn_with_state(
            policy_state,
            enforce_access_policy,
        ));

    let app = match config.base_path() {
        "" => routes,
        base => Router::new().nest(base, routes),
    };

    Ok(app.layer(
        ServiceBuilder::new()
            // Tracing layer for request/response logging
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new())
                    .on_response(
                        DefaultOnResponse::new()
                            .level(tracing::Level::INFO)
                            .latency_unit(LatencyUnit::Micros),
                    ),
            )
            .layer(cors_layer(&config.http)),
    ))
}

/// CORS for configured origins, or localhost on any port when unset
fn cors_layer(http_config: &HttpConfig) -> CorsLayer {
    let allow_origin = match &http_config.allowed_origins {
        Some(origins) => AllowOrigin::list(origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(origin = %origin, "ignoring invalid CORS origin"))
                .ok()
        })),
        None => AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin.to_str().is_ok_and(|o| {
                o.starts_with("http://localhost:") || o.starts_with("http://127.0.0.1:")
            })
        }),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

// ============================================================================
// HANDLERS
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct UserForm {
    username: Option<String>,
    password: Option<String>,
}

impl UserForm {
    fn into_pair(self) -> Option<(String, String)> {
        match (self.username, self.password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

/// Run CPU-heavy password work on the blocking pool
pub(crate) async fn blocking<T, E, F>(work: F) -> std::result::Result<T, AppError>
where
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<SsoError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(work)
        .await
        .map_err(SsoError::from)?;
    result.map_err(AppError::from)
}

/// Unwrap a form body, reporting a rejected one as `invalid_request`
pub(crate) fn form_body<T>(form: std::result::Result<Form<T>, FormRejection>) -> Result<T> {
    form.map(|Form(body)| body)
        .map_err(|rejection| SsoError::validation(rejection.body_text()))
}

/// `POST /register`. Duplicates succeed without touching the stored record.
async fn register_handler(
    State(state): State<AppState>,
    form: std::result::Result<Form<UserForm>, FormRejection>,
) -> std::result::Result<Response, AppError> {
    let (username, password) = form_body(form)?
        .into_pair()
        .ok_or_else(|| SsoError::validation("username and password are required"))?;

    let credentials = state.deps.credentials.clone();
    let outcome = {
        let username = username.clone();
        blocking(move || credentials.create(&username, &password)).await?
    };

    if let Some(target) = state.deps.config.registration_redirect() {
        return Ok(Redirect::to(target).into_response());
    }

    Ok(Json(json!({
        "username": username,
        "registered": outcome.is_created(),
    }))
    .into_response())
}

async fn registration_form_handler(
    State(state): State<AppState>,
) -> std::result::Result<Html<String>, AppError> {
    let action = format!("{}{}", state.deps.config.base_path(), PATH_REGISTER);
    let html = state
        .template_renderer
        .render_json(template::REGISTRATION, &json!({ "action": action }))?;
    Ok(Html(html))
}

async fn login_form_handler(
    State(state): State<AppState>,
) -> std::result::Result<Html<String>, AppError> {
    let base = state.deps.config.base_path();
    let html = state.template_renderer.render_json(
        template::LOGIN,
        &json!({
            "action": format!("{}{}", base, PATH_LOGIN),
            "registration": format!("{}{}", base, PATH_REGISTRATION_FORM),
        }),
    )?;
    Ok(Html(html))
}

/// `POST /login` with Basic credentials or `username`/`password` form fields
async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: std::result::Result<Form<UserForm>, FormRejection>,
) -> std::result::Result<Json<Value>, AppError> {
    let authenticator = state.deps.authenticator.clone();

    let principal = if headers.contains_key(header::AUTHORIZATION) {
        blocking(move || authenticator.authenticate_basic(&headers)).await?
    } else {
        let (username, password) = form
            .ok()
            .and_then(|Form(f)| f.into_pair())
            .ok_or(AuthError::Unauthenticated)?;
        blocking(move || authenticator.check_password(&username, &password)).await?
    };

    tracing::info!(username = %principal.username, "login succeeded");
    Ok(Json(json!({
        "username": principal.username,
        "roles": principal.roles,
    })))
}

/// `GET /whois`: identity behind the presented bearer token
async fn whois_handler(principal: Principal) -> Json<Principal> {
    Json(principal)
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found_handler(uri: Uri) -> AppError {
    SsoError::not_found(format!("no route for {}", uri.path())).into()
}

use crate::auth::credentials::CredentialStore;
use crate::auth::issuer::TokenIssuer;
use crate::auth::server::{OAuthServerState, create_oauth_routes};
use crate::model::{IssuedToken, RegisteredClient, TokenInfo};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

// base64("SOMEAPP:SECRET")
const CLIENT_BASIC: &str = "Basic U09NRUFQUDpTRUNSRVQ=";
// base64("SOMEAPP:WRONG")
const WRONG_BASIC: &str = "Basic U09NRUFQUDpXUk9ORw==";

fn routes() -> (Router, Arc<TokenIssuer>) {
    let credentials = Arc::new(CredentialStore::new());
    credentials.create("joe", "joe").unwrap();
    let issuer = Arc::new(TokenIssuer::new(
        RegisteredClient::new("SOMEAPP", "SECRET", ["USER".to_string()]),
        credentials,
        chrono::Duration::hours(12),
    ));
    let state = Arc::new(OAuthServerState::new(
        issuer.clone(),
        "http://127.0.0.1:9000/",
    ));
    (create_oauth_routes(state), issuer)
}

async fn post_form(app: Router, uri: &str, auth: Option<&str>, body: &str) -> Response {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(auth) = auth {
        request = request.header(header::AUTHORIZATION, auth);
    }
    app.oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_password_grant_with_basic_client_auth() {
    let (app, _) = routes();
    let response = post_form(
        app,
        "/oauth/token",
        Some(CLIENT_BASIC),
        "grant_type=password&username=joe&password=joe",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    let token: IssuedToken = json_body(response).await;
    assert_eq!(token.token_type, "bearer");
    assert_eq!(token.scope.as_deref(), Some("USER"));
    assert!(token.expires_in > 0);
}

#[tokio::test]
async fn test_password_grant_with_body_client_auth() {
    let (app, _) = routes();
    let response = post_form(
        app,
        "/oauth/token",
        None,
        "grant_type=password&username=joe&password=joe&client_id=SOMEAPP&client_secret=SECRET",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_client_secret_is_invalid_client() {
    let (app, _) = routes();
    let response = post_form(
        app,
        "/oauth/token",
        Some(WRONG_BASIC),
        "grant_type=password&username=joe&password=joe",
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    let body: Value = json_body(response).await;
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn test_missing_client_credentials_is_invalid_client() {
    let (app, _) = routes();
    let response = post_form(
        app,
        "/oauth/token",
        None,
        "grant_type=password&username=joe&password=joe",
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_user_password_is_invalid_grant() {
    let (app, _) = routes();
    let response = post_form(
        app,
        "/oauth/token",
        Some(CLIENT_BASIC),
        "grant_type=password&username=joe&password=nope",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_unsupported_and_missing_grant_type() {
    let (app, _) = routes();
    let response = post_form(
        app.clone(),
        "/oauth/token",
        Some(CLIENT_BASIC),
        "grant_type=client_credentials",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"], "unsupported_grant_type");

    let response = post_form(app, "/oauth/token", Some(CLIENT_BASIC), "username=joe").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_missing_password_is_invalid_request() {
    let (app, _) = routes();
    let response = post_form(
        app,
        "/oauth/token",
        Some(CLIENT_BASIC),
        "grant_type=password&username=joe",
    )
    .await;
    let body: Value = json_body(response).await;
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_scope_beyond_client_is_rejected() {
    let (app, _) = routes();
    let response = post_form(
        app.clone(),
        "/oauth/token",
        Some(CLIENT_BASIC),
        "grant_type=password&username=joe&password=joe&scope=ADMIN",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"], "invalid_scope");

    let response = post_form(
        app,
        "/oauth/token",
        Some(CLIENT_BASIC),
        "grant_type=password&username=joe&password=joe&scope=USER",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_grant() {
    let (app, issuer) = routes();
    let first = issuer.issue_token("SOMEAPP", "SECRET", "joe", "joe").unwrap();
    let refresh = first.refresh_token.clone().unwrap();

    let response = post_form(
        app,
        "/oauth/token",
        Some(CLIENT_BASIC),
        &format!("grant_type=refresh_token&refresh_token={}", refresh),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let second: IssuedToken = json_body(response).await;
    assert_ne!(second.access_token, first.access_token);
    assert!(issuer.validate_token(&first.access_token).is_err());
}

#[tokio::test]
async fn test_introspect_and_revoke() {
    let (app, issuer) = routes();
    let issued = issuer.issue_token("SOMEAPP", "SECRET", "joe", "joe").unwrap();

    let response = post_form(
        app.clone(),
        "/oauth/introspect",
        Some(CLIENT_BASIC),
        &format!("token={}", issued.access_token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let info: TokenInfo = json_body(response).await;
    assert!(info.active);
    assert_eq!(info.username.as_deref(), Some("joe"));

    let response = post_form(
        app.clone(),
        "/oauth/revoke",
        Some(CLIENT_BASIC),
        &format!("token={}", issued.access_token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // revoking again (or an unknown token) still answers 200
    let response = post_form(app.clone(), "/oauth/revoke", Some(CLIENT_BASIC), "token=unknown").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_form(
        app,
        "/oauth/introspect",
        Some(CLIENT_BASIC),
        &format!("token={}", issued.access_token),
    )
    .await;
    let info: TokenInfo = json_body(response).await;
    assert!(!info.active);
}

#[tokio::test]
async fn test_introspect_requires_client_auth() {
    let (app, _) = routes();
    let response = post_form(app, "/oauth/introspect", None, "token=x").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_metadata_document() {
    let (app, _) = routes();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/.well-known/oauth-authorization-server")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response).await;
    assert_eq!(body["issuer"], "http://127.0.0.1:9000");
    assert_eq!(body["token_endpoint"], "http://127.0.0.1:9000/oauth/token");
    assert_eq!(body["grant_types_supported"][0], "password");
}

#[tokio::test]
async fn test_non_form_body_is_invalid_request() {
    let (app, _) = routes();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/oauth/token")
                .header(header::AUTHORIZATION, CLIENT_BASIC)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"grant_type":"password"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"], "invalid_request");

    let (app, _) = routes();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/oauth/revoke")
                .header(header::AUTHORIZATION, CLIENT_BASIC)
                .body(Body::from("token=x"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

use crate::auth::authenticator::{
    Authentication, Credentials, RequestAuthenticator, client_credentials, parse_authorization,
};
use crate::auth::credentials::CredentialStore;
use crate::auth::issuer::TokenIssuer;
use crate::error::AuthError;
use crate::model::RegisteredClient;
use axum::http::{HeaderMap, HeaderValue, header};
use base64::Engine;
use std::sync::Arc;

fn headers(authorization: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(authorization).unwrap(),
    );
    headers
}

fn basic(user: &str, pass: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
    format!("Basic {}", encoded)
}

fn authenticator() -> (RequestAuthenticator, Arc<TokenIssuer>) {
    let credentials = Arc::new(CredentialStore::new());
    credentials.create("joe", "joe").unwrap();
    let issuer = Arc::new(TokenIssuer::new(
        RegisteredClient::new("SOMEAPP", "SECRET", ["USER".to_string()]),
        credentials.clone(),
        chrono::Duration::hours(1),
    ));
    (
        RequestAuthenticator::new(credentials, issuer.clone()),
        issuer,
    )
}

#[test]
fn test_parse_absent_header_is_anonymous() {
    assert_eq!(
        parse_authorization(&HeaderMap::new()),
        Ok(Credentials::Anonymous)
    );
}

#[test]
fn test_parse_basic() {
    assert_eq!(
        parse_authorization(&headers(&basic("joe", "p:w"))),
        Ok(Credentials::Basic {
            username: "joe".to_string(),
            password: "p:w".to_string(),
        })
    );
}

#[test]
fn test_parse_scheme_is_case_insensitive() {
    assert_eq!(
        parse_authorization(&headers("bearer abc123")),
        Ok(Credentials::Bearer("abc123".to_string()))
    );
    assert_eq!(
        parse_authorization(&headers("BEARER abc123")),
        Ok(Credentials::Bearer("abc123".to_string()))
    );
}

#[test]
fn test_parse_malformed_headers() {
    for value in [
        "Bearer",
        "Basic !!!notbase64",
        "Basic am9l", // "joe" without ':'
        "Bearer a b",
        "Digest abc",
    ] {
        assert!(
            matches!(
                parse_authorization(&headers(value)),
                Err(AuthError::MalformedHeader(_))
            ),
            "{}",
            value
        );
    }
}

#[test]
fn test_client_credentials_from_basic_are_form_decoded() {
    // oauth2 clients form-encode before base64
    let encoded = base64::engine::general_purpose::STANDARD.encode("my%20app:se+cret%3A");
    let result = client_credentials(&headers(&format!("Basic {}", encoded)), None, None);
    assert_eq!(
        result,
        Ok(("my app".to_string(), "se cret:".to_string()))
    );
}

#[test]
fn test_client_credentials_from_body() {
    assert_eq!(
        client_credentials(&HeaderMap::new(), Some("SOMEAPP"), Some("SECRET")),
        Ok(("SOMEAPP".to_string(), "SECRET".to_string()))
    );
    assert_eq!(
        client_credentials(&HeaderMap::new(), Some("SOMEAPP"), None),
        Err(AuthError::InvalidClient)
    );
    assert_eq!(
        client_credentials(&headers("Bearer abc"), Some("SOMEAPP"), Some("SECRET")),
        Err(AuthError::InvalidClient)
    );
}

#[test]
fn test_authenticate_bearer() {
    let (auth, issuer) = authenticator();
    let issued = issuer.issue_token("SOMEAPP", "SECRET", "joe", "joe").unwrap();

    let principal = auth
        .authenticate_bearer(&headers(&format!("Bearer {}", issued.access_token)))
        .unwrap();
    assert_eq!(principal.username, "joe");

    assert_eq!(
        auth.authenticate_bearer(&headers("Bearer garbage")),
        Err(AuthError::InvalidToken)
    );
    assert_eq!(
        auth.authenticate_bearer(&HeaderMap::new()),
        Err(AuthError::Unauthenticated)
    );
    // Basic credentials are not accepted for resources
    assert_eq!(
        auth.authenticate_bearer(&headers(&basic("joe", "joe"))),
        Err(AuthError::Unauthenticated)
    );
}

#[test]
fn test_authenticate_basic() {
    let (auth, _) = authenticator();

    let principal = auth.authenticate_basic(&headers(&basic("joe", "joe"))).unwrap();
    assert_eq!(principal.username, "joe");
    assert!(principal.client_id.is_none());

    assert_eq!(
        auth.authenticate_basic(&headers(&basic("joe", "nope"))),
        Err(AuthError::Unauthenticated)
    );
}

#[test]
fn test_authenticate_any() {
    let (auth, _) = authenticator();
    assert_eq!(auth.authenticate(&HeaderMap::new()), Ok(Authentication::Anonymous));

    let result = auth.authenticate(&headers(&basic("joe", "joe"))).unwrap();
    assert_eq!(result.principal().unwrap().username, "joe");
}

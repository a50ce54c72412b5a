use crate::ui::session::{
    SessionLogin, SessionStore, clear_session_cookie, session_id_from_headers, set_session_cookie,
};
use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{Duration, Utc};

fn login() -> SessionLogin {
    SessionLogin {
        username: "joe".to_string(),
        access_token: "tok".to_string(),
        refresh_token: Some("ref".to_string()),
    }
}

#[test]
fn test_session_lifecycle() {
    let store = SessionStore::new();
    let session = store.create_session(Duration::minutes(5));

    let fetched = store.get_session(&session.id).unwrap();
    assert_eq!(fetched.csrf_token, session.csrf_token);
    assert!(fetched.login.is_none());

    store.delete_session(&session.id);
    assert!(store.get_session(&session.id).is_none());
}

#[test]
fn test_expired_session_is_gone() {
    let store = SessionStore::new();
    let session = store.create_session(Duration::zero());

    assert!(store.get_session(&session.id).is_none());
    assert!(store.is_empty());
}

#[test]
fn test_csrf_validation() {
    let store = SessionStore::new();
    let session = store.create_session(Duration::minutes(5));

    assert!(store.validate_csrf_token(&session.id, &session.csrf_token));
    assert!(!store.validate_csrf_token(&session.id, "forged"));
    assert!(!store.validate_csrf_token("unknown", &session.csrf_token));
}

#[test]
fn test_promote_replaces_session_id() {
    let store = SessionStore::new();
    let anonymous = store.create_session(Duration::minutes(5));

    let promoted = store
        .promote(&anonymous.id, login(), Duration::hours(1))
        .unwrap();

    assert_ne!(promoted.id, anonymous.id);
    assert!(store.get_session(&anonymous.id).is_none());
    assert_eq!(store.get_session(&promoted.id).unwrap().login, Some(login()));
    // a pre-login session can only be promoted once
    assert!(store.promote(&anonymous.id, login(), Duration::hours(1)).is_none());
}

#[test]
fn test_cleanup_expired() {
    let store = SessionStore::new();
    store.create_session(Duration::zero());
    store.create_session(Duration::minutes(5));

    assert_eq!(store.cleanup_expired(), 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_session_id_from_cookie_header() {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_static("theme=dark; ssogate_session=abc123; other=1"),
    );
    assert_eq!(session_id_from_headers(&headers).as_deref(), Some("abc123"));

    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_static("ssogate_session_x=1"));
    assert_eq!(session_id_from_headers(&headers), None);

    assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
}

#[test]
fn test_cookie_flags() {
    let cookie = set_session_cookie("abc", Utc::now(), true);
    assert!(cookie.starts_with("ssogate_session=abc;"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Lax"));

    let cleared = clear_session_cookie(false);
    assert!(cleared.contains("Max-Age=0"));
    assert!(!cleared.contains("Secure"));
}

use crate::auth::policy::{Access, AccessPolicy, AccessRule, Mechanism, RoutePattern};

#[test]
fn test_standard_table_order() {
    let policy = AccessPolicy::standard();
    let patterns: Vec<&RoutePattern> = policy.rules().iter().map(|r| &r.pattern).collect();

    assert_eq!(patterns[0], &RoutePattern::exact("/register"));
    assert_eq!(patterns[1], &RoutePattern::exact("/registration"));
    assert_eq!(patterns[2], &RoutePattern::exact("/login"));
    assert_eq!(patterns[3], &RoutePattern::exact("/oauth/token"));
    assert_eq!(patterns.last().unwrap(), &&RoutePattern::Any);
}

#[test]
fn test_public_routes() {
    let policy = AccessPolicy::standard();
    for path in [
        "/register",
        "/registration",
        "/login",
        "/oauth/token",
        "/oauth/introspect",
        "/oauth/revoke",
        "/.well-known/oauth-authorization-server",
        "/healthz",
    ] {
        assert_eq!(policy.evaluate(path).access, Access::Public, "{}", path);
    }
}

#[test]
fn test_handler_checked_mechanisms() {
    let policy = AccessPolicy::standard();
    assert_eq!(policy.evaluate("/login").mechanism, Mechanism::Password);
    assert_eq!(
        policy.evaluate("/oauth/token").mechanism,
        Mechanism::ClientCredentials
    );
    assert_eq!(policy.evaluate("/register").mechanism, Mechanism::None);
}

#[test]
fn test_everything_else_needs_bearer() {
    let policy = AccessPolicy::standard();
    for path in ["/whois", "/", "/register/extra", "/oauth/tokens", "/admin"] {
        let rule = policy.evaluate(path);
        assert_eq!(rule.access, Access::Authenticated, "{}", path);
        assert_eq!(rule.mechanism, Mechanism::Bearer, "{}", path);
    }
}

#[test]
fn test_first_match_wins() {
    let policy = AccessPolicy::new(vec![
        AccessRule::bearer(RoutePattern::exact("/open")),
        AccessRule::public(RoutePattern::exact("/open")),
    ]);
    assert_eq!(policy.evaluate("/open").access, Access::Authenticated);

    let policy = AccessPolicy::new(vec![
        AccessRule::public(RoutePattern::exact("/open")),
        AccessRule::bearer(RoutePattern::exact("/open")),
    ]);
    assert_eq!(policy.evaluate("/open").access, Access::Public);
}

#[test]
fn test_empty_table_falls_back_to_authenticated() {
    let policy = AccessPolicy::new(Vec::new());
    assert_eq!(policy.evaluate("/anything").access, Access::Authenticated);
}

#[test]
fn test_prefix_matches_segment_boundary() {
    let pattern = RoutePattern::prefix("/static/");
    assert!(pattern.matches("/static"));
    assert!(pattern.matches("/static/app.css"));
    assert!(!pattern.matches("/staticfiles"));
}

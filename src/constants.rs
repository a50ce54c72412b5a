//! Constants used throughout ssogate
//!
//! Configuration defaults, OAuth2 wire values and route paths.

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "ssogate.config.json";

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default auth server port
pub const DEFAULT_HTTP_PORT: u16 = 9000;

/// Where the UI service and the test client find the auth server
pub const DEFAULT_AUTH_SERVER_URL: &str = "http://127.0.0.1:9000";

/// Default UI service port
pub const DEFAULT_UI_PORT: u16 = 9001;

/// Default access token lifetime (12 hours)
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

/// Default refresh token lifetime (30 days)
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Upper bound accepted for any configured token lifetime (10 years)
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Default interval of the expired-token sweep
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Environment variable prefix for `$env:VAR` expansion in config strings
pub const ENV_VAR_PREFIX: &str = "$env";

/// Environment variable overriding the configured client secret
pub const ENV_CLIENT_SECRET: &str = "SSOGATE_CLIENT_SECRET";

// ============================================================================
// OAUTH2
// ============================================================================

/// Default statically configured client id
pub const DEFAULT_CLIENT_ID: &str = "SOMEAPP";

/// Default statically configured client secret
pub const DEFAULT_CLIENT_SECRET: &str = "SECRET";

/// Role given to every registered user
pub const DEFAULT_ROLE: &str = "USER";

/// Scope granted to the default client
pub const DEFAULT_SCOPE: &str = "USER";

/// Token type reported by the token endpoint
pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// Grant type: resource-owner password
pub const GRANT_TYPE_PASSWORD: &str = "password";

/// Grant type: refresh token
pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";

/// Random bytes per minted token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Authorization scheme: Basic
pub const SCHEME_BASIC: &str = "Basic";

/// Authorization scheme: Bearer
pub const SCHEME_BEARER: &str = "Bearer";

// ============================================================================
// ROUTES
// ============================================================================

pub const PATH_REGISTER: &str = "/register";
pub const PATH_REGISTRATION_FORM: &str = "/registration";
pub const PATH_LOGIN: &str = "/login";
pub const PATH_TOKEN: &str = "/oauth/token";
pub const PATH_INTROSPECT: &str = "/oauth/introspect";
pub const PATH_REVOKE: &str = "/oauth/revoke";
pub const PATH_METADATA: &str = "/.well-known/oauth-authorization-server";
pub const PATH_HEALTH: &str = "/healthz";
pub const PATH_WHOIS: &str = "/whois";

// ============================================================================
// UI SERVICE
// ============================================================================

/// Session cookie used by the UI service
pub const UI_SESSION_COOKIE: &str = "ssogate_session";

/// Lifetime of the pre-login session carrying the CSRF token
pub const UI_LOGIN_SESSION_TTL_SECS: i64 = 10 * 60;

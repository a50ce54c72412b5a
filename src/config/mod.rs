//! Configuration management for ssogate
//!
//! Loads configuration from `ssogate.config.json` (or a YAML file given on
//! the command line). Every section has defaults, so an absent file yields
//! a working local setup with the `SOMEAPP`/`SECRET` client and a seeded
//! `joe` account.

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_AUTH_SERVER_URL,
    DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_CLIENT_ID, DEFAULT_CLIENT_SECRET, DEFAULT_HOST,
    DEFAULT_HTTP_PORT, DEFAULT_REFRESH_TOKEN_TTL_SECS, DEFAULT_SCOPE, DEFAULT_UI_PORT,
    ENV_CLIENT_SECRET, ENV_VAR_PREFIX, MAX_TOKEN_TTL_SECS,
};
use crate::{Result, SsoError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete ssogate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Auth server HTTP configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Client, token lifetimes and issuer
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Accounts created at startup
    #[serde(default = "default_seed_users")]
    pub users: Vec<SeedUser>,

    /// Registration behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationConfig>,

    /// UI service configuration
    #[serde(default)]
    pub ui: UiConfig,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Mount every route below this prefix (e.g. `/sso`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,

    /// Allowed CORS origins. If not specified, any localhost origin is allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: None,
            allowed_origins: None,
        }
    }
}

/// The statically configured client and token lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConfig {
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Supports `$env:VAR`; `SSOGATE_CLIENT_SECRET` overrides it
    #[serde(default = "default_client_secret")]
    pub client_secret: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: i64,

    /// `None` keeps refresh tokens for the process lifetime
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: Option<i64>,

    #[serde(default = "default_true")]
    pub issue_refresh_tokens: bool,

    /// Interval of the expired-token sweep; 0 disables it
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Issuer URL advertised in metadata. Defaults to `http://host:port[basePath]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            client_secret: default_client_secret(),
            scopes: default_scopes(),
            access_token_ttl_secs: default_access_ttl(),
            refresh_token_ttl_secs: default_refresh_ttl(),
            issue_refresh_tokens: true,
            cleanup_interval_secs: default_cleanup_interval(),
            issuer: None,
        }
    }
}

/// Account created at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedUser {
    pub username: String,
    /// Supports `$env:VAR`
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationConfig {
    /// Answer `/register` with a 303 to this location instead of JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

/// UI service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_ui_port")]
    pub port: u16,

    /// Root URL of the auth server, base path included
    #[serde(default = "default_auth_server_url")]
    pub auth_server_url: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Supports `$env:VAR`
    #[serde(default = "default_client_secret")]
    pub client_secret: String,

    /// Mark the session cookie `Secure` (requires HTTPS)
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_ui_port(),
            auth_server_url: default_auth_server_url(),
            client_id: default_client_id(),
            client_secret: default_client_secret(),
            secure_cookies: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_ui_port() -> u16 {
    DEFAULT_UI_PORT
}

fn default_auth_server_url() -> String {
    DEFAULT_AUTH_SERVER_URL.to_string()
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_client_secret() -> String {
    DEFAULT_CLIENT_SECRET.to_string()
}

fn default_scopes() -> Vec<String> {
    vec![DEFAULT_SCOPE.to_string()]
}

fn default_access_ttl() -> i64 {
    DEFAULT_ACCESS_TOKEN_TTL_SECS
}

fn default_refresh_ttl() -> Option<i64> {
    Some(DEFAULT_REFRESH_TOKEN_TTL_SECS)
}

fn default_cleanup_interval() -> u64 {
    DEFAULT_CLEANUP_INTERVAL_SECS
}

fn default_seed_users() -> Vec<SeedUser> {
    vec![SeedUser {
        username: "joe".to_string(),
        password: "joe".to_string(),
        roles: vec!["SUPERVISOR".to_string()],
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            oauth: OAuthConfig::default(),
            users: default_seed_users(),
            registration: None,
            ui: UiConfig::default(),
            log: Some(LogConfig {
                level: Some("info".to_string()),
            }),
        }
    }
}

impl Config {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(CONFIG_FILE_NAME)
    }

    /// Load configuration from specific path
    ///
    /// `.yaml`/`.yml` files are parsed as YAML, everything else as JSON.
    /// A missing file yields the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::parse(&content, is_yaml(path))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.resolve_env();
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str, yaml: bool) -> Result<Self> {
        if yaml {
            serde_yaml::from_str(content)
                .map_err(|e| SsoError::config(format!("Failed to parse YAML config: {}", e)))
        } else {
            serde_json::from_str(content)
                .map_err(|e| SsoError::config(format!("Failed to parse JSON config: {}", e)))
        }
    }

    /// Save configuration to specific path (format by extension)
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Expand `$env:VAR` references and apply environment overrides
    pub fn resolve_env(&mut self) {
        self.oauth.client_secret = expand_env_value(&self.oauth.client_secret);
        self.ui.client_secret = expand_env_value(&self.ui.client_secret);
        for user in &mut self.users {
            user.password = expand_env_value(&user.password);
        }

        if let Ok(secret) = std::env::var(ENV_CLIENT_SECRET)
            && !secret.is_empty()
        {
            self.oauth.client_secret = secret.clone();
            self.ui.client_secret = secret;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(SsoError::config("oauth.clientId is required"));
        }
        if self.oauth.client_secret.is_empty() {
            return Err(SsoError::config("oauth.clientSecret is required"));
        }
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&self.oauth.access_token_ttl_secs) {
            return Err(SsoError::config(format!(
                "oauth.accessTokenTtlSecs must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self
            .oauth
            .refresh_token_ttl_secs
            .is_some_and(|ttl| !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl))
        {
            return Err(SsoError::config(format!(
                "oauth.refreshTokenTtlSecs must be between 1 and {} when set",
                MAX_TOKEN_TTL_SECS
            )));
        }

        if let Some(base) = self.http.base_path.as_deref()
            && (!base.starts_with('/') || base.len() < 2 || base.ends_with('/'))
        {
            return Err(SsoError::config(format!(
                "http.basePath '{}' must start with '/' and not end with '/'",
                base
            )));
        }

        for user in &self.users {
            if user.username.trim().is_empty() || user.username.contains(':') {
                return Err(SsoError::config(format!(
                    "invalid seed username '{}'",
                    user.username
                )));
            }
            if user.password.is_empty() {
                return Err(SsoError::config(format!(
                    "seed user '{}' has an empty password",
                    user.username
                )));
            }
        }

        url::Url::parse(&self.ui.auth_server_url).map_err(|e| {
            SsoError::config(format!(
                "ui.authServerUrl '{}' is not a valid URL: {}",
                self.ui.auth_server_url, e
            ))
        })?;

        if let Some(uri) = self
            .registration
            .as_ref()
            .and_then(|r| r.redirect_uri.as_deref())
            && uri.is_empty()
        {
            return Err(SsoError::config("registration.redirectUri must not be empty"));
        }

        Ok(())
    }

    /// Route prefix, empty when mounted at the root
    pub fn base_path(&self) -> &str {
        self.http.base_path.as_deref().unwrap_or("")
    }

    /// Issuer URL advertised in the metadata document
    pub fn issuer_url(&self) -> String {
        match &self.oauth.issuer {
            Some(issuer) => issuer.trim_end_matches('/').to_string(),
            None => format!(
                "http://{}:{}{}",
                self.http.host,
                self.http.port,
                self.base_path()
            ),
        }
    }

    /// Where `/register` should redirect, if anywhere
    pub fn registration_redirect(&self) -> Option<&str> {
        self.registration
            .as_ref()
            .and_then(|r| r.redirect_uri.as_deref())
    }

    pub fn log_level(&self) -> Option<&str> {
        self.log.as_ref().and_then(|l| l.level.as_deref())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Expand a `$env:VAR` reference; other values pass through unchanged
pub fn expand_env_value(value: &str) -> String {
    match value.strip_prefix(ENV_VAR_PREFIX).and_then(|v| v.strip_prefix(':')) {
        Some(var_name) => std::env::var(var_name).unwrap_or_default(),
        None => value.to_string(),
    }
}

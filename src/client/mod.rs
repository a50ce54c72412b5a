//! Test client for the auth server
//!
//! [`RestCall`] describes one HTTP call as plain data and [`execute`] runs
//! it. [`SsoClient`] strings calls together into the
//! `register -> oauth/token -> whois` dance.

use crate::constants::{
    GRANT_TYPE_PASSWORD, GRANT_TYPE_REFRESH_TOKEN, PATH_REGISTER, PATH_TOKEN, PATH_WHOIS,
};
use crate::error::NetworkError;
use crate::model::{IssuedToken, Principal};
use crate::Result;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Credentials attached to a call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CallAuth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer(String),
}

/// One outbound HTTP call.
///
/// `params` go into the query string for `GET` and into a
/// form-urlencoded body for everything else.
#[derive(Debug, Clone)]
pub struct RestCall {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub auth: CallAuth,
}

impl RestCall {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            params: Vec::new(),
            auth: CallAuth::None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn basic(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = CallAuth::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Client credentials for the OAuth endpoints. Both parts are
    /// url-encoded first, as RFC 6749 section 2.3.1 requires.
    pub fn client_basic(self, client_id: &str, client_secret: &str) -> Self {
        self.basic(
            urlencoding::encode(client_id).into_owned(),
            urlencoding::encode(client_secret).into_owned(),
        )
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.auth = CallAuth::Bearer(token.into());
        self
    }
}

/// Build the shared HTTP client. Redirects are never followed.
pub fn http_client() -> Result<reqwest::Client> {
    let client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(NetworkError::from)?;
    Ok(client)
}

/// Send a call and return the raw response, whatever its status
pub async fn send(http: &reqwest::Client, call: &RestCall) -> Result<reqwest::Response> {
    let url = url::Url::parse(&call.url)?;
    let mut request = http.request(call.method.clone(), url);

    for (name, value) in &call.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if !call.params.is_empty() {
        request = if call.method == Method::GET {
            request.query(&call.params)
        } else {
            request.form(&call.params)
        };
    }
    request = match &call.auth {
        CallAuth::None => request,
        CallAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
        CallAuth::Bearer(token) => request.bearer_auth(token),
    };

    tracing::debug!(method = %call.method, url = %call.url, "sending request");
    Ok(request.send().await.map_err(NetworkError::from)?)
}

/// Run a call and decode a successful JSON response into `T`
pub async fn execute<T: DeserializeOwned>(http: &reqwest::Client, call: &RestCall) -> Result<T> {
    let response = send(http, call).await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(NetworkError::Status {
            status: status.as_u16(),
            body,
        }
        .into());
    }
    Ok(response.json::<T>().await.map_err(NetworkError::from)?)
}

/// Answer of `/register`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    /// `None` when the server answered with a redirect
    #[serde(default)]
    pub registered: Option<bool>,
}

/// Everything the dance produced
#[derive(Debug, Clone, Serialize)]
pub struct DanceReport {
    pub registration: Option<Registration>,
    pub token: IssuedToken,
    pub identity: Principal,
}

/// Client for one auth server, authenticating as one OAuth client
#[derive(Debug, Clone)]
pub struct SsoClient {
    http: reqwest::Client,
    root: String,
    client_id: String,
    client_secret: String,
}

impl SsoClient {
    /// `root` is the server's base URL, base path included
    pub fn new(
        root: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self::with_http(http_client()?, root, client_id, client_secret))
    }

    pub fn with_http(
        http: reqwest::Client,
        root: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            root: root.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.root, path)
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<Registration> {
        let call = RestCall::post(self.url(PATH_REGISTER))
            .param("username", username)
            .param("password", password);

        let response = send(&self.http, &call).await?;
        let status = response.status();
        if status.is_redirection() {
            return Ok(Registration {
                username: username.to_string(),
                registered: None,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        Ok(response
            .json::<Registration>()
            .await
            .map_err(NetworkError::from)?)
    }

    /// Resource-owner password grant
    pub async fn password_token(&self, username: &str, password: &str) -> Result<IssuedToken> {
        let call = RestCall::post(self.url(PATH_TOKEN))
            .client_basic(&self.client_id, &self.client_secret)
            .param("grant_type", GRANT_TYPE_PASSWORD)
            .param("username", username)
            .param("password", password);
        execute(&self.http, &call).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedToken> {
        let call = RestCall::post(self.url(PATH_TOKEN))
            .client_basic(&self.client_id, &self.client_secret)
            .param("grant_type", GRANT_TYPE_REFRESH_TOKEN)
            .param("refresh_token", refresh_token);
        execute(&self.http, &call).await
    }

    pub async fn whois(&self, access_token: &str) -> Result<Principal> {
        let call = RestCall::get(self.url(PATH_WHOIS)).bearer(access_token);
        execute(&self.http, &call).await
    }

    /// Register (unless skipped), get a token and ask who it belongs to
    pub async fn dance(
        &self,
        username: &str,
        password: &str,
        skip_register: bool,
    ) -> Result<DanceReport> {
        let registration = if skip_register {
            None
        } else {
            let registration = self.register(username, password).await?;
            tracing::info!(username, registered = ?registration.registered, "registered");
            Some(registration)
        };

        let token = self.password_token(username, password).await?;
        tracing::info!(expires_in = token.expires_in, "token obtained");

        let identity = self.whois(&token.access_token).await?;
        tracing::info!(username = %identity.username, "identity confirmed");

        Ok(DanceReport {
            registration,
            token,
            identity,
        })
    }
}

#[cfg(test)]
mod client_test;

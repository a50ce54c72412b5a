//! ssogate - OAuth2 password-grant single sign-on
//!
//! The crate ships three cooperating pieces:
//! - an auth server that registers users, issues bearer tokens with the
//!   resource-owner password grant and answers `/whois`
//! - a UI service that logs users in against the auth server
//! - a test client that runs the `register -> token -> whois` dance
//!
//! # Example
//!
//! ```rust,no_run
//! use ssogate::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     ssogate::init_logging();
//!     let config = Config::load()?;
//!     ssogate::http::start_server(config).await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod constants;
pub mod error;
pub mod model;

pub mod core;

// Auth server
pub mod auth;
pub mod config;
pub mod http;

// Relying parties
pub mod client;
pub mod ui;

pub mod cli;

// Re-exports for convenience
pub use error::{AuthError, Result, SsoError};
pub use model::{IssuedToken, Principal};

const DEFAULT_LOG_FILTER: &str = "ssogate=info";

/// Initialize logging for the application
pub fn init_logging() {
    init_logging_with_level(None);
}

/// Initialize logging with a level from configuration.
///
/// `RUST_LOG` still wins when set. Calling this more than once is a no-op.
pub fn init_logging_with_level(level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let default = level
        .map(|l| format!("ssogate={}", l))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

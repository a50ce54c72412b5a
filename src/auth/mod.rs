//! Authentication and authorization for the SSO server
//!
//! - **credentials**: in-memory user registry with Argon2 password hashes
//! - **issuer**: password/refresh grants and the opaque bearer token table
//! - **authenticator**: `Authorization` header parsing and principal resolution
//! - **policy** / **middleware**: ordered route access table and its enforcement
//! - **server**: OAuth2 token, introspection, revocation and metadata endpoints

pub mod authenticator;
pub mod credentials;
pub mod issuer;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod server;

pub use authenticator::{
    Authentication, Credentials, RequestAuthenticator, client_credentials, parse_authorization,
};
pub use credentials::{CreateOutcome, CredentialStore};
pub use issuer::{TokenIssuer, generate_token};
pub use middleware::{PolicyState, enforce_access_policy};
pub use policy::{Access, AccessPolicy, AccessRule, Mechanism, RoutePattern};
pub use server::{OAuthServerState, create_oauth_routes};

#[cfg(test)]
mod authenticator_test;
#[cfg(test)]
mod credentials_test;
#[cfg(test)]
mod policy_test;
#[cfg(test)]
mod server_test;

//! Password hashing and verification.
//!
//! Uses Argon2id with a fresh random salt per hash.

use super::issuer::generate_token;
use crate::{Result, SsoError};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::LazyLock;

/// Hash a password using Argon2id.
///
/// Returns the PHC-formatted hash string suitable for storage.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| SsoError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password(&generate_token()).unwrap_or_else(|e| {
        tracing::error!("failed to build dummy password hash: {}", e);
        String::new()
    })
});

/// Hash checked when the username is unknown, so a miss costs the same
/// Argon2 work as a wrong password.
pub fn dummy_hash() -> &'static str {
    DUMMY_HASH.as_str()
}

/// Verify a password against a stored hash.
///
/// Malformed hashes verify as `false` rather than erroring.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

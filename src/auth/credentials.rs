//! In-memory user registry
//!
//! Uses DashMap so request tasks never take an external lock. Creation is
//! idempotent: the first registration of a username wins and later ones are
//! no-ops, even when they race.

use super::password::{dummy_hash, hash_password, verify_password};
use crate::constants::DEFAULT_ROLE;
use crate::model::User;
use crate::{Result, SsoError};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::BTreeSet;

/// Outcome of [`CredentialStore::create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// Username was taken; the stored record is untouched
    AlreadyExists,
}

impl CreateOutcome {
    pub fn is_created(self) -> bool {
        self == CreateOutcome::Created
    }
}

/// Process-lifetime user registry
#[derive(Default)]
pub struct CredentialStore {
    users: DashMap<String, User>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with the default `USER` role
    pub fn create(&self, username: &str, password: &str) -> Result<CreateOutcome> {
        self.create_with_roles(username, password, [DEFAULT_ROLE.to_string()])
    }

    /// Register a user with explicit roles (used for seeded accounts)
    pub fn create_with_roles(
        &self,
        username: &str,
        password: &str,
        roles: impl IntoIterator<Item = String>,
    ) -> Result<CreateOutcome> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(SsoError::validation("password must not be empty"));
        }

        // Skip the expensive hash for the common duplicate case. The entry
        // below is what makes the insert atomic.
        if self.users.contains_key(username) {
            tracing::debug!(username, "registration ignored, username already taken");
            return Ok(CreateOutcome::AlreadyExists);
        }

        let mut roles: BTreeSet<String> = roles.into_iter().collect();
        if roles.is_empty() {
            roles.insert(DEFAULT_ROLE.to_string());
        }
        let user = User {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            roles,
            created_at: Utc::now(),
        };

        match self.users.entry(username.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(user);
                tracing::info!(username, "user registered");
                Ok(CreateOutcome::Created)
            }
            Entry::Occupied(_) => {
                tracing::debug!(username, "registration lost race, keeping first record");
                Ok(CreateOutcome::AlreadyExists)
            }
        }
    }

    pub fn lookup(&self, username: &str) -> Option<User> {
        self.users.get(username).map(|u| u.value().clone())
    }

    /// Look up `username` and check `password` against its hash
    pub fn verify(&self, username: &str, password: &str) -> Option<User> {
        let Some(user) = self.lookup(username) else {
            verify_password(password, dummy_hash());
            return None;
        };
        verify_password(password, &user.password_hash).then_some(user)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Usernames travel inside `user:pass` Basic credentials, so `:` is banned.
fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(SsoError::validation("username must not be empty"));
    }
    if username.contains(':') {
        return Err(SsoError::validation("username must not contain ':'"));
    }
    if username.chars().any(char::is_control) {
        return Err(SsoError::validation(
            "username must not contain control characters",
        ));
    }
    Ok(())
}

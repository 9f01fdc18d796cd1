//! Key repository trait and implementations.
//!
//! This module defines the [`KeyRepository`] trait for resolving the shared
//! secret of a caller, together with three in-memory implementations:
//! [`StaticKeyRepository`] (a user to key map), [`SingleKeyRepository`] (one key
//! for everyone) and [`SingleUserKeyRepository`] (one key for one user).

use std::collections::HashMap;
use std::fmt;

/// Trait for looking up the shared secret of a user.
///
/// The username is `None` when the configuration does not carry a user header
/// or the request did not send one; implementations may still map that to a
/// default key.
pub trait KeyRepository: Send + Sync {
    /// Retrieve the key for `username`, or `Ok(None)` when there is none.
    ///
    /// # Errors
    ///
    /// Any lookup failure. Callers wrap it into
    /// [`AuthError::KeyRepository`](crate::error::AuthError::KeyRepository).
    fn get_key(&self, username: Option<&str>) -> anyhow::Result<Option<String>>;
}

/// An in-memory key repository backed by a `HashMap`.
///
/// # Examples
///
/// ```
/// use hmacgate_auth::keys::{KeyRepository, StaticKeyRepository};
///
/// let keys = StaticKeyRepository::new(vec![("TestUser".to_owned(), "TestKey".to_owned())]);
/// assert_eq!(keys.get_key(Some("TestUser")).unwrap().as_deref(), Some("TestKey"));
/// assert_eq!(keys.get_key(None).unwrap(), None);
/// ```
#[derive(Clone, Default)]
pub struct StaticKeyRepository {
    keys: HashMap<String, String>,
}

impl StaticKeyRepository {
    /// Create a repository from `(username, key)` pairs.
    pub fn new(keys: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Add or replace the key of `username`.
    pub fn insert(&mut self, username: impl Into<String>, key: impl Into<String>) {
        self.keys.insert(username.into(), key.into());
    }
}

impl fmt::Debug for StaticKeyRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut users: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        users.sort_unstable();
        f.debug_struct("StaticKeyRepository")
            .field("users", &users)
            .finish()
    }
}

impl KeyRepository for StaticKeyRepository {
    fn get_key(&self, username: Option<&str>) -> anyhow::Result<Option<String>> {
        Ok(username.and_then(|user| self.keys.get(user).cloned()))
    }
}

/// Returns the same key for every lookup, with or without a username.
#[derive(Clone)]
pub struct SingleKeyRepository {
    key: String,
}

impl SingleKeyRepository {
    /// Create a repository that always answers `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl fmt::Debug for SingleKeyRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleKeyRepository").finish_non_exhaustive()
    }
}

impl KeyRepository for SingleKeyRepository {
    fn get_key(&self, _username: Option<&str>) -> anyhow::Result<Option<String>> {
        Ok(Some(self.key.clone()))
    }
}

/// Returns the key only for one named user (compared exactly).
#[derive(Clone)]
pub struct SingleUserKeyRepository {
    username: String,
    key: String,
}

impl SingleUserKeyRepository {
    /// Create a repository that knows only `username`.
    pub fn new(username: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            key: key.into(),
        }
    }
}

impl fmt::Debug for SingleUserKeyRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleUserKeyRepository")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl KeyRepository for SingleUserKeyRepository {
    fn get_key(&self, username: Option<&str>) -> anyhow::Result<Option<String>> {
        Ok((username == Some(self.username.as_str())).then(|| self.key.clone()))
    }
}

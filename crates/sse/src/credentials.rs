//! In-memory credential store.
//!
//! Holds the active bearer token and the descriptor for logging in again.
//! Nothing here is ever persisted; a new process starts unauthenticated.

use std::sync::RwLock;

use crate::types::CachedLogin;

/// Shared store for the bearer token and cached login descriptor.
#[derive(Default)]
pub(crate) struct CredentialStore {
    token: RwLock<Option<String>>,
    login: RwLock<Option<CachedLogin>>,
}

impl CredentialStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Overwrites the active token unconditionally. The token is opaque;
    /// no format validation is applied.
    pub(crate) fn set_token(&self, token: &str) {
        *self.token.write().unwrap() = Some(token.to_string());
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }

    /// Replaces the cached login descriptor.
    pub(crate) fn cache_login(&self, login: CachedLogin) {
        *self.login.write().unwrap() = Some(login);
    }

    pub(crate) fn cached_login(&self) -> Option<CachedLogin> {
        self.login.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_is_empty() {
        let store = CredentialStore::new();
        assert!(store.token().is_none());
        assert!(store.cached_login().is_none());
    }

    #[test]
    fn set_and_overwrite_token() {
        let store = CredentialStore::new();
        store.set_token("tok-1");
        assert_eq!(store.token().as_deref(), Some("tok-1"));
        store.set_token("tok-2");
        assert_eq!(store.token().as_deref(), Some("tok-2"));
    }

    #[test]
    fn cache_login_replaces() {
        let store = CredentialStore::new();
        store.cache_login(CachedLogin::User {
            email: "a@example.com".into(),
            hashed_password: "h1".into(),
        });
        store.cache_login(CachedLogin::Hub {
            hub_id: "hub-1".into(),
            hub_token: "ht".into(),
        });
        assert_eq!(
            store.cached_login(),
            Some(CachedLogin::Hub {
                hub_id: "hub-1".into(),
                hub_token: "ht".into(),
            })
        );
    }
}

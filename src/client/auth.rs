//! Bearer credential storage
//!
//! Token acquisition, refresh and persistence belong to the embedding
//! application's auth flow; the core only attaches whatever credential is
//! currently set to outgoing fetch/command calls.

use std::sync::RwLock;

/// Shared bearer credential for all API calls.
pub struct TokenStore {
    token: RwLock<Option<String>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            token: RwLock::new(None),
        }
    }

    /// Install a credential after login or refresh
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().expect("token lock poisoned") = Some(token.into());
    }

    /// Drop the credential (logout, or after an unauthorized response)
    pub fn clear(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    pub fn current(&self) -> Option<String> {
        self.token.read().expect("token lock poisoned").clone()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = self.token.read().expect("token lock poisoned").is_some();
        f.debug_struct("TokenStore").field("set", &set).finish()
    }
}

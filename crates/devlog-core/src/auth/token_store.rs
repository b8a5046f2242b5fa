use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use super::storage::RefreshStore;

/// Holds the session's credentials: the access token in memory only and
/// the refresh token in a durable [`RefreshStore`].
///
/// Storage failures never surface from here. They are logged and reads
/// behave as if nothing were stored.
pub struct TokenStore {
    access: RwLock<Option<String>>,
    refresh: Arc<dyn RefreshStore>,
}

impl TokenStore {
    pub fn new(refresh: Arc<dyn RefreshStore>) -> Self {
        Self {
            access: RwLock::new(None),
            refresh,
        }
    }

    /// Current access token, if any.
    pub fn get_access(&self) -> Option<String> {
        self.access
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the in-memory access token.
    pub fn set_access(&self, token: Option<String>) {
        *self.access.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn get_refresh(&self) -> Option<String> {
        match self.refresh.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read refresh token");
                None
            }
        }
    }

    pub fn set_refresh(&self, token: &str) {
        if let Err(e) = self.refresh.save(token) {
            warn!(error = %e, "Failed to persist refresh token");
        }
    }

    pub fn clear_refresh(&self) {
        if let Err(e) = self.refresh.clear() {
            warn!(error = %e, "Failed to clear refresh token");
        }
    }

    /// Install a freshly issued pair.
    pub fn store_pair(&self, access: &str, refresh: &str) {
        self.set_access(Some(access.to_string()));
        self.set_refresh(refresh);
    }

    /// Forget both tokens.
    pub fn clear(&self) {
        self.set_access(None);
        self.clear_refresh();
    }

    pub fn has_refresh(&self) -> bool {
        self.get_refresh().is_some()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print credentials
        f.debug_struct("TokenStore")
            .field("has_access", &self.get_access().is_some())
            .finish_non_exhaustive()
    }
}

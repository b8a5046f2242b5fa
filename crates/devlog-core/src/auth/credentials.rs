use anyhow::{Context, Result};
use keyring::Entry;

use super::storage::{RefreshStore, REFRESH_KEY};

const SERVICE_NAME: &str = "devlog";

/// Refresh token kept in the OS keychain.
pub struct KeyringRefreshStore {
    service: String,
}

impl KeyringRefreshStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a different keychain service, e.g. one per backend profile.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, REFRESH_KEY).context("Failed to create keyring entry")
    }
}

impl Default for KeyringRefreshStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshStore for KeyringRefreshStore {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve refresh token from keychain"),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store refresh token in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete refresh token from keychain"),
        }
    }
}

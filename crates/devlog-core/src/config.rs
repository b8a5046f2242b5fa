//! Application configuration management.
//!
//! Holds the backend URL, request timeout, where the refresh token is kept
//! and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/devlog/config.json`. The API URL
//! can be overridden with `DEVLOG_API_URL`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileRefreshStore, KeyringRefreshStore, MemoryRefreshStore, RefreshStore};

/// Application name used for config directory paths
const APP_NAME: &str = "devlog";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides the configured API URL.
pub const API_URL_ENV: &str = "DEVLOG_API_URL";

/// Backend used when nothing is configured: the local dev server.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// HTTP request timeout in seconds.
/// 30s allows for slow image generation while still failing eventually.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where the refresh token survives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// Plain-text file in the config directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Not persisted; every run starts signed out
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub token_storage: TokenStorage,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    /// Effective API base URL, honoring `DEVLOG_API_URL`.
    pub fn api_url(&self) -> String {
        resolve_api_url(std::env::var(API_URL_ENV).ok(), self.api_url.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Build the configured refresh-token backend.
    pub fn refresh_store(&self) -> Result<Arc<dyn RefreshStore>> {
        Ok(match self.token_storage {
            TokenStorage::File => Arc::new(FileRefreshStore::new(Self::config_dir()?)),
            TokenStorage::Keyring => Arc::new(KeyringRefreshStore::new()),
            TokenStorage::Memory => Arc::new(MemoryRefreshStore::new()),
        })
    }
}

/// Pick the API URL: environment first, then config, then the default.
/// Blank values count as unset.
pub fn resolve_api_url(env: Option<String>, configured: Option<&str>) -> String {
    env.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| configured.map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or(DEFAULT_API_URL)
        .trim_end_matches('/')
        .to_string()
}

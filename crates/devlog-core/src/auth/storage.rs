use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

/// Fixed storage key for the refresh token. Used as the file name by
/// [`FileRefreshStore`] and the account name by the keychain backend.
pub const REFRESH_KEY: &str = "miniblog_refresh_token";

/// Durable key-value slot holding the refresh token as plain text.
pub trait RefreshStore: Send + Sync {
    /// Read the stored token; `Ok(None)` when nothing is stored.
    fn load(&self) -> Result<Option<String>>;

    /// Store `token`, overwriting any previous value.
    fn save(&self, token: &str) -> Result<()>;

    /// Remove the stored token. Removing a missing token is not an error.
    fn clear(&self) -> Result<()>;
}

/// Refresh token kept in a plain-text file under a directory.
pub struct FileRefreshStore {
    dir: PathBuf,
}

impl FileRefreshStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(REFRESH_KEY)
    }
}

impl RefreshStore for FileRefreshStore {
    fn load(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read refresh token from {}", path.display()))?;
        let token = contents.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).context("Failed to create token directory")?;
        let path = self.path();
        let mut file = open_private(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(token.as_bytes())
            .with_context(|| format!("Failed to write refresh token to {}", path.display()))?;
        // Files left by older versions may be group-readable
        restrict_permissions(&path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove refresh token file")?;
        }
        Ok(())
    }
}

/// Open for writing, creating the file owner-only.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .context("Failed to restrict refresh token permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Process-local slot. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryRefreshStore {
    token: Mutex<Option<String>>,
}

impl MemoryRefreshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RefreshStore for MemoryRefreshStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot().clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRefreshStore::new(dir.path().join("nested"));

        assert_eq!(store.load().unwrap(), None);
        store.save("r-1").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("r-1"));

        // Rotation overwrites the previous token
        store.save("r-2").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("r-2"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_ignores_blank_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(REFRESH_KEY), "\n").unwrap();
        let store = FileRefreshStore::new(dir.path());
        assert_eq!(store.load().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileRefreshStore::new(dir.path());
        store.save("secret").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_created_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(REFRESH_KEY);
        drop(open_private(&path).unwrap());
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);

        // A pre-existing readable file is tightened on save
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        FileRefreshStore::new(dir.path()).save("r-2").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "r-2");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryRefreshStore::with_token("r-1");
        assert_eq!(store.load().unwrap().as_deref(), Some("r-1"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}

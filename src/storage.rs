//! Bearer token persistence
//!
//! A single token string is written under the configured key after every
//! successful (re-)authorization and removed after every failure.
//! [`MemoryTokenStore`] keeps it in process; [`FileTokenStore`] writes one
//! file per key, with user-only permissions on Unix.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Errors that can occur during token storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key cannot be used as a storage slot
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// I/O error during storage operations
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key/value slot for the bearer token
pub trait TokenStore: Send + Sync {
    /// Persist `token` under `key`, replacing any previous value
    ///
    /// # Errors
    /// Returns error if the value cannot be written
    fn set(&self, key: &str, token: &str) -> Result<(), StorageError>;

    /// Read the value under `key`
    ///
    /// # Errors
    /// Returns error if the slot exists but cannot be read
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove the value under `key`; removing a missing key is not an error
    ///
    /// # Errors
    /// Returns error if the slot exists but cannot be removed
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn set(&self, key: &str, token: &str) -> Result<(), StorageError> {
        (**self).set(key, token)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// Type alias for a shared token store
pub type SharedTokenStore = Arc<dyn TokenStore>;

// ============================================================================
// In-memory store
// ============================================================================

/// In-process token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for MemoryTokenStore {
    fn set(&self, key: &str, token: &str) -> Result<(), StorageError> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), token.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

/// Token store writing one file per key under a directory
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTokenStore {
    /// Create a store in the platform data directory
    /// (e.g. `~/.local/share/keycloak-auth` on Linux)
    #[must_use]
    pub fn new() -> Self {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keycloak-auth");
        Self { dir }
    }

    /// Create a store in a custom directory
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the token files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && key != "."
            && key != "..";
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.token")))
    }
}

impl TokenStore for FileTokenStore {
    fn set(&self, key: &str, token: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, token)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(token) => Ok(Some(token)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

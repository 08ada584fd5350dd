//! Key/value persistence tiers.
//!
//! The storefront keeps two tiers of client-side state, mirroring a browser:
//! a *session* tier that lives as long as the shopping session and a
//! *persistent* tier that survives restarts. Both are expressed through
//! [`KeyValueStore`] so that stores never care where bytes end up.
//!
//! - [`MemoryStorage`] - process-local map, used for session tiers and tests
//! - [`FileStorage`] - one JSON file per key under a directory

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised by a storage tier.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key the tier cannot store.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// A string key/value store.
///
/// Implementations must be safe to share between tasks. No operation spans
/// more than one key, so callers performing read-modify-write sequences get
/// no isolation from each other.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tier cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the tier cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the tier cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON value.
///
/// # Errors
///
/// Returns an error if the tier fails or the stored text is not valid JSON
/// for `T`.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    store
        .get(key)?
        .map(|raw| serde_json::from_str(&raw).map_err(StorageError::from))
        .transpose()
}

/// Encode and store a JSON value.
///
/// # Errors
///
/// Returns an error if encoding fails or the tier cannot be written.
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

// =============================================================================
// MemoryStorage
// =============================================================================

/// In-memory storage tier.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// FileStorage
// =============================================================================

/// Directory-backed storage tier: each key is stored as `<dir>/<key>.json`,
/// with the key percent-encoded so that any string maps to a single file name.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash never leaves a half-written value behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the stored keys.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        // `/` and `\` are always encoded, so the name never leaves `dir`.
        Ok(self.dir.join(format!("{}.json", urlencoding::encode(key))))
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pickpack-storage-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_memory_roundtrip() {
        let store = MemoryStorage::new();
        assert!(store.is_empty());
        store.set("cart_guest", "[]").unwrap();
        assert_eq!(store.get("cart_guest").unwrap().as_deref(), Some("[]"));
        store.remove("cart_guest").unwrap();
        assert_eq!(store.get("cart_guest").unwrap(), None);
        store.remove("cart_guest").unwrap();
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStorage::new();
        write_json(&store, "numbers", &vec![1, 2, 3]).unwrap();
        let back: Option<Vec<i32>> = read_json(&store, "numbers").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        store.set("broken", "{not json").unwrap();
        assert!(matches!(
            read_json::<Vec<i32>>(&store, "broken"),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_file_storage_persists_between_handles() {
        let dir = temp_dir("persist");
        let first = FileStorage::open(&dir).unwrap();
        first.set("authToken", "abc").unwrap();

        let second = FileStorage::open(&dir).unwrap();
        assert_eq!(second.get("authToken").unwrap().as_deref(), Some("abc"));
        second.remove("authToken").unwrap();
        assert_eq!(first.get("authToken").unwrap(), None);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_storage_keeps_keys_inside_dir() {
        let dir = temp_dir("keys");
        let store = FileStorage::open(&dir).unwrap();

        store.set("../escape", "x").unwrap();
        assert_eq!(store.get("../escape").unwrap().as_deref(), Some("x"));
        assert!(!dir.parent().unwrap().join("escape.json").exists());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);

        assert!(matches!(store.get(""), Err(StorageError::InvalidKey(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_storage_accepts_opaque_keys() {
        let dir = temp_dir("opaque");
        let store = FileStorage::open(&dir).unwrap();

        for key in ["cart_auth0|42", "cart_nimal@example.lk", "cart_a b/c"] {
            store.set(key, "[]").unwrap();
            assert_eq!(store.get(key).unwrap().as_deref(), Some("[]"));
        }
        assert_eq!(store.get("cart_auth0").unwrap(), None);

        store.remove("cart_auth0|42").unwrap();
        assert_eq!(store.get("cart_auth0|42").unwrap(), None);
        fs::remove_dir_all(&dir).unwrap();
    }
}

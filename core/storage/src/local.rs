//! Filesystem-backed local store.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::provider::LocalStore;
use starsync_common::{Error, Result, StoreKey};

/// Characters escaped in key file names. Dots are escaped too, so an
/// encoded name never starts with one and cannot clash with temp files.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Local store keeping one file per key under a root directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
pub struct FileLocalStore {
    root: PathBuf,
}

impl FileLocalStore {
    /// Create a new file store rooted at `root`.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - `LocalStore` if the directory cannot be created
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            Error::LocalStore(format!("Cannot create {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys currently present on disk, in file-name order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::LocalStore(format!("Cannot list {}: {}", self.root.display(), e))
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::LocalStore(e.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            keys.push(percent_decode_str(name).decode_utf8_lossy().into_owned());
        }
        keys.sort();
        Ok(keys)
    }

    fn key_path(&self, key: &StoreKey) -> PathBuf {
        let encoded = utf8_percent_encode(key.as_str(), KEY_ENCODE_SET).to_string();
        self.root.join(encoded)
    }

    fn temp_path(&self, key: &StoreKey) -> PathBuf {
        let encoded = utf8_percent_encode(key.as_str(), KEY_ENCODE_SET).to_string();
        self.root.join(format!(".{}.tmp", encoded))
    }
}

impl LocalStore for FileLocalStore {
    fn name(&self) -> &str {
        "file"
    }

    fn get(&self, key: &StoreKey) -> Result<Option<String>> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::LocalStore(format!("Cannot read {}: {}", key, e))),
        }
    }

    fn set(&self, key: &StoreKey, value: &str) -> Result<()> {
        let path = self.key_path(key);
        let temp_path = self.temp_path(key);

        fs::write(&temp_path, value)
            .map_err(|e| Error::LocalStore(format!("Cannot write {}: {}", key, e)))?;
        fs::rename(&temp_path, &path)
            .map_err(|e| Error::LocalStore(format!("Cannot commit {}: {}", key, e)))?;

        debug!("Stored {} ({} bytes) at {}", key, value.len(), path.display());
        Ok(())
    }

    fn remove(&self, key: &StoreKey) -> Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::LocalStore(format!("Cannot remove {}: {}", key, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get() {
        let temp = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp.path()).unwrap();
        let key = StoreKey::new("collection").unwrap();

        assert!(store.get(&key).unwrap().is_none());
        store.set(&key, r#"[{"name":"Siber"}]"#).unwrap();
        assert_eq!(
            store.get(&key).unwrap().as_deref(),
            Some(r#"[{"name":"Siber"}]"#)
        );
    }

    #[test]
    fn test_overwrite() {
        let temp = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp.path()).unwrap();
        let key = StoreKey::new("stars").unwrap();

        store.set(&key, "100").unwrap();
        store.set(&key, "90").unwrap();
        assert_eq!(store.get(&key).unwrap().as_deref(), Some("90"));
    }

    #[test]
    fn test_reserved_key_is_encoded() {
        let temp = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp.path()).unwrap();
        let key = StoreKey::reserved("pending");

        store.set(&key, "{}").unwrap();

        assert!(temp.path().join("__sync%2Fpending").exists());
        assert_eq!(store.keys().unwrap(), vec!["__sync/pending".to_string()]);
        assert_eq!(store.get(&key).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_remove() {
        let temp = TempDir::new().unwrap();
        let store = FileLocalStore::new(temp.path()).unwrap();
        let key = StoreKey::new("stars").unwrap();

        store.set(&key, "1").unwrap();
        store.remove(&key).unwrap();
        store.remove(&key).unwrap();
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_persistence() {
        let temp = TempDir::new().unwrap();
        let key = StoreKey::new("totalStarsEarned").unwrap();

        {
            let store = FileLocalStore::new(temp.path()).unwrap();
            store.set(&key, "250").unwrap();
        }

        {
            let store = FileLocalStore::new(temp.path()).unwrap();
            assert_eq!(store.get(&key).unwrap().as_deref(), Some("250"));
        }
    }
}

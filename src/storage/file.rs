//! File-backed store
//!
//! All entries live in a single JSON object on disk, rewritten through a
//! temporary file and rename on every change. With an encryption secret
//! configured each value is sealed with AES-256-GCM; a value that fails to
//! open (wrong secret, tampering) reads as absent.

use super::{BackupStore, StorageError};
use crate::utils::crypto::{derive_encryption_key, open_string, seal, StorageKey};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub struct FileStore {
    path: PathBuf,
    key: Option<StorageKey>,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: None,
            lock: Mutex::new(()),
        }
    }

    /// Encrypt stored values with a key derived from `secret`
    #[must_use]
    pub fn with_encryption_secret(mut self, secret: &str) -> Self {
        self.key = Some(derive_encryption_key(secret.as_bytes()));
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                StorageError::Corrupt(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let document = serde_json::to_string_pretty(entries)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        fs::write(&tmp_path, document)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn seal_value(&self, value: &str) -> Result<String, StorageError> {
        match &self.key {
            Some(key) => seal(value.as_bytes(), key).map_err(|e| StorageError::Crypto(e.to_string())),
            None => Ok(value.to_string()),
        }
    }

    fn open_value(&self, key: &str, stored: &str) -> Option<String> {
        match &self.key {
            Some(encryption_key) => match open_string(stored, encryption_key) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("Discarding unreadable stored value for '{key}': {e}");
                    None
                }
            },
            None => Some(stored.to_string()),
        }
    }
}

impl BackupStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = self.load()?;
        Ok(entries.get(key).and_then(|stored| self.open_value(key, stored)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let sealed = self.seal_value(value)?;
        let mut entries = self.load()?;
        entries.insert(key.to_string(), sealed);
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.into_keys().collect())
    }
}

//! Durable key/value storage for the chosen locale.

use std::collections::{
    BTreeMap,
    HashMap,
};
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{
    Path,
    PathBuf,
};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to access storage '{path}': {message}")]
    Io { path: String, message: String },
    #[error("Storage '{path}' is not a JSON object of strings: {message}")]
    Corrupt { path: String, message: String },
}

/// A string key/value store that outlives the engine.
#[async_trait]
pub trait LocaleStorage: Debug + Send + Sync {
    /// # Errors
    /// When the storage cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    /// When the storage cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Storage kept in memory. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    /// Stored values by key
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocaleStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage in a JSON file holding one object of strings.
///
/// A missing file reads as empty and is created on the first write.
#[derive(Debug)]
pub struct FileStorage {
    /// JSON file holding the entries
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: &std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.display().to_string(), message: e.to_string() }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(&e)),
        };
        serde_json::from_str(&text).map_err(|e| StorageError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl LocaleStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.to_string());

        let text = serde_json::to_string_pretty(&entries).map_err(|e| StorageError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_error(&e))?;
        }
        tokio::fs::write(&self.path, text).await.map_err(|e| self.io_error(&e))?;
        tracing::debug!(path = %self.path.display(), key, "Stored value");
        Ok(())
    }
}

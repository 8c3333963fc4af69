//! Filesystem settings backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::{EmbedError, Result};
use crate::settings::SettingsStore;

/// Settings store that keeps the whole record in a single JSON file.
///
/// A missing file reads as an empty record. Intermediate directories are
/// created on the first write. Writes are read-modify-write under a lock, so
/// clones of one `FsStore` never lose each other's updates.
///
/// # Example
///
/// ```rust,no_run
/// use tana_tweaks::FsStore;
///
/// let store = FsStore::new("/home/me/.config/tana-tweaks/settings.json");
/// ```
#[derive(Clone)]
pub struct FsStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FsStore {
    /// Create a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(EmbedError::Storage(Box::new(e))),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    async fn store(&self, record: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EmbedError::Storage(Box::new(e)))?;
        }
        let body = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&self.path, &body)
            .await
            .map_err(|e| EmbedError::Storage(Box::new(e)))?;

        tracing::debug!("Wrote {} bytes to {}", body.len(), self.path.display());
        Ok(())
    }
}

impl SettingsStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut record = self.load().await?;
        record.extend(entries);
        self.store(&record).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut record = self.load().await?;
        if record.remove(key).is_some() {
            self.store(&record).await?;
        }
        Ok(())
    }
}

// src/recording/storage.rs
//! Late-message persistence
//!
//! Holds at most one file of undelivered batch bodies. It is written only
//! when the final flush on shutdown fails, and read back on the next start.

use crate::utils::config::StorageSettings;
use crate::utils::errors::{Result, TrackerError};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Durable storage for batches that missed delivery
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Stored bytes, if any
    async fn load_pending(&self) -> Result<Option<Bytes>>;

    /// Replace the stored bytes
    async fn save_pending(&self, body: &[u8]) -> Result<()>;

    /// Remove the stored bytes; absent data is not an error
    async fn delete_pending(&self) -> Result<()>;
}

/// File-backed pending store
pub struct FilePendingStore {
    path: PathBuf,
}

impl FilePendingStore {
    /// Create the storage directory if needed
    pub async fn new(settings: &StorageSettings) -> Result<Self> {
        fs::create_dir_all(&settings.base_dir).await.map_err(|e| {
            TrackerError::StorageFailed(format!(
                "Failed to create directory {:?}: {}",
                settings.base_dir, e
            ))
        })?;

        let path = settings.base_dir.join(&settings.file_name);
        info!("Late-message store at {:?}", path);

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

#[async_trait]
impl PendingStore for FilePendingStore {
    async fn load_pending(&self) -> Result<Option<Bytes>> {
        match fs::read(&self.path).await {
            Ok(data) if data.is_empty() => Ok(None),
            Ok(data) => {
                debug!("Loaded {} pending bytes from {:?}", data.len(), self.path);
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TrackerError::StorageFailed(format!(
                "Failed to read {:?}: {}",
                self.path, e
            ))),
        }
    }

    async fn save_pending(&self, body: &[u8]) -> Result<()> {
        // Write aside then rename so a crash never leaves a torn file
        let temp = self.temp_path();
        fs::write(&temp, body).await.map_err(|e| {
            TrackerError::StorageFailed(format!("Failed to write {:?}: {}", temp, e))
        })?;
        fs::rename(&temp, &self.path).await.map_err(|e| {
            TrackerError::StorageFailed(format!("Failed to rename {:?}: {}", temp, e))
        })?;

        debug!("Saved {} pending bytes to {:?}", body.len(), self.path);
        Ok(())
    }

    async fn delete_pending(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TrackerError::StorageFailed(format!(
                "Failed to delete {:?}: {}",
                self.path, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store_in(dir: &Path) -> FilePendingStore {
        let settings = StorageSettings {
            base_dir: dir.join("nested"),
            ..Default::default()
        };
        FilePendingStore::new(&settings).await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;
        assert_eq!(store.load_pending().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;

        store.save_pending(b"late batch").await.unwrap();
        assert_eq!(
            store.load_pending().await.unwrap(),
            Some(Bytes::from_static(b"late batch"))
        );
        assert!(!store.temp_path().exists());

        store.save_pending(b"replaced").await.unwrap();
        assert_eq!(
            store.load_pending().await.unwrap(),
            Some(Bytes::from_static(b"replaced"))
        );

        store.delete_pending().await.unwrap();
        assert_eq!(store.load_pending().await.unwrap(), None);
        // Deleting twice is fine
        store.delete_pending().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_file_is_none() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path()).await;
        store.save_pending(&[]).await.unwrap();
        assert_eq!(store.load_pending().await.unwrap(), None);
    }
}

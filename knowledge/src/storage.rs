//! Durable storage for the user-added documents.
//!
//! Storage holds a single value: the JSON array of every persisted document.
//! Each save overwrites it completely.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::KnowledgeDocument;
use crate::error::{KnowledgeError, Result};

/// A single-slot string store.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Read the stored value, if any.
    async fn read(&self) -> Result<Option<String>>;

    /// Replace the stored value.
    async fn write(&self, value: &str) -> Result<()>;

    /// Delete the stored value. Deleting an absent value is not an error.
    async fn remove(&self) -> Result<()>;

    /// Load the persisted documents. An absent value is an empty set.
    async fn load_documents(&self) -> Result<Vec<KnowledgeDocument>> {
        match self.read().await? {
            Some(value) => Ok(serde_json::from_str(&value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Overwrite the persisted documents.
    async fn save_documents(&self, documents: &[KnowledgeDocument]) -> Result<()> {
        let value = serde_json::to_string(documents)?;
        self.write(&value).await
    }
}

/// Storage backed by one JSON file.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentStorage for FileStorage {
    async fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KnowledgeError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                KnowledgeError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        // Write atomically using a temp file
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, value).await.map_err(|e| {
            KnowledgeError::Storage(format!("failed to write {}: {e}", temp_path.display()))
        })?;
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            KnowledgeError::Storage(format!("failed to write {}: {e}", self.path.display()))
        })?;

        debug!("Wrote {} bytes to {}", value.len(), self.path.display());
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KnowledgeError::Storage(format!(
                "failed to delete {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// In-process storage, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    value: RwLock<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with a raw value.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(value.into())),
        }
    }
}

#[async_trait]
impl DocumentStorage for MemoryStorage {
    async fn read(&self) -> Result<Option<String>> {
        Ok(self.value.read().await.clone())
    }

    async fn write(&self, value: &str) -> Result<()> {
        *self.value.write().await = Some(value.to_string());
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        *self.value.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("nested").join("custom-texts.json"));

        assert!(storage.load_documents().await.unwrap().is_empty());

        let docs = vec![KnowledgeDocument::user_text("Kadag is primordial purity")];
        storage.save_documents(&docs).await.unwrap();
        assert_eq!(storage.load_documents().await.unwrap(), docs);

        storage.remove().await.unwrap();
        assert!(!storage.path().exists());
        storage.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let storage = MemoryStorage::new();
        storage
            .save_documents(&[
                KnowledgeDocument::user_text("a"),
                KnowledgeDocument::user_text("b"),
            ])
            .await
            .unwrap();

        let only = vec![KnowledgeDocument::user_text("c")];
        storage.save_documents(&only).await.unwrap();

        assert_eq!(storage.load_documents().await.unwrap(), only);
    }

    #[tokio::test]
    async fn test_corrupt_value_fails_to_load() {
        let storage = MemoryStorage::with_value("{not json");
        assert!(storage.load_documents().await.is_err());
    }
}

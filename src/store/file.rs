//! JSON-file collection store.
//!
//! Each collection is one `<key>.json` document under the store directory.
//! Writes go to a temporary file that is renamed over the original while an
//! exclusive lock on `<key>.lock` is held, so readers never see a partial file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use super::{Collection, CollectionStore};

/// On-disk collection format version
const FORMAT_VERSION: u32 = 1;

/// Collection document as written to disk
#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    version: u32,
    items: Vec<Value>,
}

/// Store keeping one JSON document per collection in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a collection document
    pub fn collection_path(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.json", collection.key()))
    }

    fn lock_path(&self, collection: Collection) -> PathBuf {
        self.root.join(format!("{}.lock", collection.key()))
    }
}

#[async_trait]
impl CollectionStore for FileStore {
    async fn load_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let path = self.collection_path(collection);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read collection: {}", path.display()))?;

        let file: CollectionFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse collection: {}", path.display()))?;

        if file.version > FORMAT_VERSION {
            anyhow::bail!(
                "Collection {} has format version {}, newest supported is {}",
                path.display(),
                file.version,
                FORMAT_VERSION
            );
        }

        Ok(file.items)
    }

    async fn save_all(&self, collection: Collection, items: &[Value]) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create store directory: {}", self.root.display()))?;

        let document = serde_json::to_string_pretty(&CollectionFile {
            version: FORMAT_VERSION,
            items: items.to_vec(),
        })
        .context("Failed to serialize collection")?;

        let path = self.collection_path(collection);
        let lock_path = self.lock_path(collection);
        let count = items.len();

        tokio::task::spawn_blocking(move || write_locked(&path, &lock_path, &document))
            .await
            .context("Collection writer task panicked")??;

        debug!(collection = %collection, items = count, "Saved collection");
        Ok(())
    }
}

/// Replace `path` with `document` under an exclusive lock
fn write_locked(path: &Path, lock_path: &Path, document: &str) -> Result<()> {
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

    lock.lock_exclusive()
        .with_context(|| format!("Failed to acquire lock: {}", lock_path.display()))?;

    let tmp_path = path.with_extension("json.tmp");
    let mut tmp = std::fs::File::create(&tmp_path)
        .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
    tmp.write_all(document.as_bytes())
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tmp.sync_all()?;
    drop(tmp);

    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    // Lock is released when the handle is dropped
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load_all(Collection::Artifacts).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("store"));

        let items = vec![json!({ "type": "document", "content": "hi" })];
        store.save_all(Collection::Artifacts, &items).await.unwrap();

        let reopened = FileStore::new(dir.path().join("store"));
        assert_eq!(reopened.load_all(Collection::Artifacts).await.unwrap(), items);
        assert!(reopened.collection_path(Collection::Artifacts).exists());
        assert!(!dir.path().join("store/artifacts.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_collections_are_separate_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        store
            .save_all(Collection::Chats, &[json!({ "messages": [] })])
            .await
            .unwrap();

        assert!(store.load_all(Collection::Artifacts).await.unwrap().is_empty());
        assert_eq!(store.load_all(Collection::Chats).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_newer_format_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::write(
            store.collection_path(Collection::Templates),
            r#"{"version": 99, "items": []}"#,
        )
        .unwrap();

        let err = store.load_all(Collection::Templates).await.unwrap_err();
        assert!(err.to_string().contains("format version 99"));
    }
}

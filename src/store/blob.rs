//! Content-addressed blob storage for binary artifact payloads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

/// Blob key: SHA256(bytes)[0:16] as hex
pub fn blob_key(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();

    // First 16 bytes (32 hex chars)
    hex::encode(&result[..16])
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid blob key: '{}'", key);
    }
    Ok(())
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their key (idempotent for equal content)
    async fn put(&self, bytes: &[u8]) -> Result<String>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a blob; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Blobs as files named by key under a directory
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String> {
        let key = blob_key(bytes);
        let path = self.blob_path(&key)?;

        if !path.exists() {
            fs::create_dir_all(&self.root)
                .await
                .with_context(|| format!("Failed to create blob directory: {}", self.root.display()))?;
            fs::write(&path, bytes)
                .await
                .with_context(|| format!("Failed to write blob: {}", path.display()))?;
            debug!(key = %key, size = bytes.len(), "Stored blob");
        }

        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .await
            .with_context(|| format!("Failed to read blob: {}", path.display()))?;
        Ok(Some(bytes))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.blob_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete blob: {}", path.display())),
        }
    }
}

/// Blobs held in memory
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn blobs(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("Blob store lock poisoned"))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String> {
        let key = blob_key(bytes);
        self.blobs()?.insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        Ok(self.blobs()?.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self.blobs()?.remove(key).is_some())
    }
}

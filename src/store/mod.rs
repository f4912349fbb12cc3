//! Persistence collaborators.
//!
//! Entities are persisted as whole collections keyed by a fixed logical name:
//! every mutation loads the collection, changes it, and replaces it. Binary
//! payloads owned by artifacts (voice audio) live in a separate blob store.

pub mod blob;
pub mod file;
pub mod memory;

use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Logical collection names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Artifacts,
    Chats,
    Templates,
    KnowledgeBases,
}

impl Collection {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Artifacts => "artifacts",
            Self::Chats => "chats",
            Self::Templates => "templates",
            Self::KnowledgeBases => "knowledge_bases",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Whole-collection persistence
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Every item of a collection, in stored order (empty if never saved)
    async fn load_all(&self, collection: Collection) -> Result<Vec<Value>>;

    /// Replace a collection with `items`
    async fn save_all(&self, collection: Collection, items: &[Value]) -> Result<()>;
}

/// Load a collection and deserialize every item
pub async fn load_typed<T: DeserializeOwned>(
    store: &dyn CollectionStore,
    collection: Collection,
) -> Result<Vec<T>> {
    store
        .load_all(collection)
        .await?
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .with_context(|| format!("Failed to parse item {} of collection '{}'", i, collection))
        })
        .collect()
}

/// Serialize every item and replace the collection
pub async fn save_typed<T: Serialize>(
    store: &dyn CollectionStore,
    collection: Collection,
    items: &[T],
) -> Result<()> {
    let values = items
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to serialize collection '{}'", collection))?;
    store.save_all(collection, &values).await
}

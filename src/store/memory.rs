//! In-memory collection store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Collection, CollectionStore};

/// Volatile store that counts its writes
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Value>>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save_all` calls
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every subsequent save fail
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn load_all(&self, collection: Collection) -> Result<Vec<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_all(&self, collection: Collection, items: &[Value]) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            anyhow::bail!("Memory store is refusing writes to '{}'", collection);
        }

        self.collections
            .write()
            .await
            .insert(collection, items.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_counts_saves() {
        let store = MemoryStore::new();
        assert_eq!(store.save_count(), 0);

        store.save_all(Collection::Artifacts, &[json!(1)]).await.unwrap();
        store.save_all(Collection::Artifacts, &[json!(1), json!(2)]).await.unwrap();

        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load_all(Collection::Artifacts).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_saves_leave_data_untouched() {
        let store = MemoryStore::new();
        store.save_all(Collection::Chats, &[json!("a")]).await.unwrap();

        store.fail_saves(true);
        assert!(store.save_all(Collection::Chats, &[]).await.is_err());
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load_all(Collection::Chats).await.unwrap(), vec![json!("a")]);
    }
}

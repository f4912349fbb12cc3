//! Notifications to holders of artifact references.
//!
//! Other entities (chat transcripts, mostly) point at artifacts by id and
//! cache their titles. After an update or delete the orchestrator tells the
//! reference holder, which keeps those pointers current. Notifications are
//! fire-and-forget: a holder logs its own failures and never fails the
//! operation that triggered it.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::{Artifact, ArtifactId, ArtifactType};
use crate::store::{Collection, CollectionStore};

#[async_trait]
pub trait ReferenceHolder: Send + Sync {
    async fn notify_artifact_updated(&self, artifact: &Artifact);

    async fn notify_artifact_deleted(&self, id: ArtifactId);
}

/// Holder that ignores every notification
pub struct NoopReferences;

#[async_trait]
impl ReferenceHolder for NoopReferences {
    async fn notify_artifact_updated(&self, _artifact: &Artifact) {}

    async fn notify_artifact_deleted(&self, _id: ArtifactId) {}
}

/// What a [`ChannelReferences`] subscriber receives
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceNotice {
    Updated {
        id: ArtifactId,
        artifact_type: ArtifactType,
        title: Option<String>,
    },
    Deleted {
        id: ArtifactId,
    },
}

/// Broadcasts notices to any number of in-process subscribers
pub struct ChannelReferences {
    sender: broadcast::Sender<ReferenceNotice>,
}

impl ChannelReferences {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReferenceNotice> {
        self.sender.subscribe()
    }

    fn send(&self, notice: ReferenceNotice) {
        // No subscribers is not an error
        if self.sender.send(notice).is_err() {
            debug!("No reference subscribers");
        }
    }
}

#[async_trait]
impl ReferenceHolder for ChannelReferences {
    async fn notify_artifact_updated(&self, artifact: &Artifact) {
        self.send(ReferenceNotice::Updated {
            id: artifact.id,
            artifact_type: artifact.artifact_type(),
            title: artifact.title.clone(),
        });
    }

    async fn notify_artifact_deleted(&self, id: ArtifactId) {
        self.send(ReferenceNotice::Deleted { id });
    }
}

/// Keeps artifact references in the `chats` collection current.
///
/// Each chat is an object with a `messages` array; a message referencing an
/// artifact carries `artifact_id` and a cached `artifact_title`. Updates
/// refresh the cached title, deletes drop the reference from the message.
pub struct ChatReferences {
    store: Arc<dyn CollectionStore>,
}

impl ChatReferences {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self { store }
    }

    /// Apply `edit` to every message referencing `id`; returns messages changed
    async fn rewrite<F>(&self, id: ArtifactId, edit: F) -> Result<usize>
    where
        F: Fn(&mut serde_json::Map<String, Value>) + Send + Sync,
    {
        let target = id.to_string();
        let mut chats = self.store.load_all(Collection::Chats).await?;
        let mut changed = 0;

        for chat in chats.iter_mut() {
            let messages = match chat.get_mut("messages").and_then(Value::as_array_mut) {
                Some(messages) => messages,
                None => continue,
            };
            for message in messages.iter_mut().filter_map(Value::as_object_mut) {
                if message.get("artifact_id").and_then(Value::as_str) == Some(target.as_str()) {
                    edit(message);
                    changed += 1;
                }
            }
        }

        if changed > 0 {
            self.store.save_all(Collection::Chats, &chats).await?;
        }
        Ok(changed)
    }
}

#[async_trait]
impl ReferenceHolder for ChatReferences {
    async fn notify_artifact_updated(&self, artifact: &Artifact) {
        let title = Value::String(artifact.display_title());
        let result = self
            .rewrite(artifact.id, |message| {
                message.insert("artifact_title".to_string(), title.clone());
            })
            .await;

        match result {
            Ok(changed) => debug!(artifact_id = %artifact.id, changed, "Refreshed chat references"),
            Err(e) => warn!(artifact_id = %artifact.id, error = %e, "Failed to refresh chat references"),
        }
    }

    async fn notify_artifact_deleted(&self, id: ArtifactId) {
        let result = self
            .rewrite(id, |message| {
                message.remove("artifact_id");
                message.remove("artifact_title");
            })
            .await;

        match result {
            Ok(changed) => debug!(artifact_id = %id, changed, "Dropped chat references"),
            Err(e) => warn!(artifact_id = %id, error = %e, "Failed to drop chat references"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContentModel;
    use crate::plugins::document::DocumentContent;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn document(title: &str) -> Artifact {
        Artifact::new(
            DocumentContent {
                content: "x".into(),
                ..Default::default()
            }
            .into_content(),
        )
        .with_title(title)
    }

    #[tokio::test]
    async fn test_channel_delivers_notices() {
        let references = ChannelReferences::new(8);
        let mut receiver = references.subscribe();
        let artifact = document("Plan");

        references.notify_artifact_updated(&artifact).await;
        references.notify_artifact_deleted(artifact.id).await;

        assert_eq!(
            receiver.recv().await.unwrap(),
            ReferenceNotice::Updated {
                id: artifact.id,
                artifact_type: ArtifactType::Document,
                title: Some("Plan".into()),
            }
        );
        assert_eq!(
            receiver.recv().await.unwrap(),
            ReferenceNotice::Deleted { id: artifact.id }
        );
    }

    #[tokio::test]
    async fn test_channel_without_subscribers() {
        let references = ChannelReferences::new(1);
        references.notify_artifact_deleted(ArtifactId::new()).await;
    }

    #[tokio::test]
    async fn test_chat_titles_refreshed_and_dropped() {
        let store = Arc::new(MemoryStore::new());
        let artifact = document("Q3 Report");
        let other = ArtifactId::new();

        store
            .save_all(
                Collection::Chats,
                &[json!({
                    "messages": [
                        { "role": "assistant", "content": "Here", "artifact_id": artifact.id.to_string(), "artifact_title": "Draft" },
                        { "role": "assistant", "content": "Also", "artifact_id": other.to_string(), "artifact_title": "Other" }
                    ]
                })],
            )
            .await
            .unwrap();

        let references = ChatReferences::new(store.clone());

        references.notify_artifact_updated(&artifact).await;
        let chats = store.load_all(Collection::Chats).await.unwrap();
        assert_eq!(chats[0]["messages"][0]["artifact_title"], "Q3 Report");
        assert_eq!(chats[0]["messages"][1]["artifact_title"], "Other");

        references.notify_artifact_deleted(artifact.id).await;
        let chats = store.load_all(Collection::Chats).await.unwrap();
        assert!(chats[0]["messages"][0].get("artifact_id").is_none());
        assert_eq!(chats[0]["messages"][0]["content"], "Here");
        assert_eq!(chats[0]["messages"][1]["artifact_id"], other.to_string());
    }

    #[tokio::test]
    async fn test_chat_references_skip_save_when_unreferenced() {
        let store = Arc::new(MemoryStore::new());
        let references = ChatReferences::new(store.clone());

        references.notify_artifact_deleted(ArtifactId::new()).await;
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_store_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let artifact = document("T");
        store
            .save_all(
                Collection::Chats,
                &[json!({ "messages": [{ "artifact_id": artifact.id.to_string() }] })],
            )
            .await
            .unwrap();
        store.fail_saves(true);

        ChatReferences::new(store.clone())
            .notify_artifact_updated(&artifact)
            .await;
    }
}

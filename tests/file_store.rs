//! File Store Integration Tests
//!
//! Tests that artifacts survive a restart when persisted through the
//! file-backed collection and blob stores.

use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use artifex::adapters::StaticGenerator;
use artifex::core::{ExportFormat, PluginManager};
use artifex::domain::ArtifactType;
use artifex::plugins::{self, PluginServices};
use artifex::store::{Collection, CollectionStore, FileBlobStore, FileStore};
use artifex::Orchestrator;

/// Wire an orchestrator over `root`, as a fresh process would
fn open(root: &std::path::Path) -> (Orchestrator, Arc<FileStore>) {
    let services = PluginServices::new(Arc::new(FileBlobStore::new(root.join("blobs"))))
        .with_generator(Arc::new(
            StaticGenerator::new().with_response(ArtifactType::Ask, "Rayleigh scattering."),
        ));
    let mut manager = PluginManager::new();
    plugins::register_builtin(&mut manager, &services).unwrap();

    let store = Arc::new(FileStore::new(root.join("store")));
    (Orchestrator::new(Arc::new(manager), store.clone()), store)
}

#[tokio::test]
async fn test_artifacts_survive_restart() {
    let temp = TempDir::new().unwrap();

    let (id, answer_id) = {
        let (orchestrator, _) = open(temp.path());
        let doc = orchestrator
            .create("document", json!({ "title": "Notes", "content": "First line" }))
            .await
            .unwrap();
        let answer = orchestrator
            .create("ask", json!({ "question": "Why is the sky blue?" }))
            .await
            .unwrap();
        (doc.id, answer.id)
    };

    let (orchestrator, store) = open(temp.path());
    assert!(store.collection_path(Collection::Artifacts).exists());

    let doc = orchestrator.get(id).await.unwrap();
    assert_eq!(doc.title.as_deref(), Some("Notes"));

    let answer = orchestrator.get(answer_id).await.unwrap();
    let payload = answer.to_payload().unwrap();
    assert_eq!(payload["answer"], "Rayleigh scattering.");
    assert_eq!(payload["metadata"]["source_prompt"], "Why is the sky blue?");

    let updated = orchestrator
        .update(json!({ "id": id.to_string(), "content": "Second line" }))
        .await
        .unwrap();
    assert_eq!(updated.metadata.revision, 2);

    let markdown = orchestrator.export(id, ExportFormat::Markdown).await.unwrap();
    assert!(markdown.starts_with("# Notes"));
    assert!(markdown.contains("Second line"));
}

#[tokio::test]
async fn test_on_disk_layout() {
    let temp = TempDir::new().unwrap();
    let (orchestrator, store) = open(temp.path());

    let created = orchestrator
        .create("diagram", json!({ "source": "sequenceDiagram\n  A->>B: hi" }))
        .await
        .unwrap();

    let raw = std::fs::read_to_string(store.collection_path(Collection::Artifacts)).unwrap();
    let file: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(file["version"], 1);
    assert_eq!(file["items"][0]["id"], created.id.to_string());
    assert_eq!(file["items"][0]["type"], "diagram");

    // Other collections are untouched
    assert!(store.load_all(Collection::Chats).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_is_persisted() {
    let temp = TempDir::new().unwrap();

    let id = {
        let (orchestrator, _) = open(temp.path());
        let first = orchestrator
            .create("code", json!({ "language": "python", "code": "print(1)" }))
            .await
            .unwrap();
        orchestrator
            .create("code", json!({ "language": "python", "code": "print(2)" }))
            .await
            .unwrap();
        orchestrator.delete(first.id).await.unwrap();
        first.id
    };

    let (orchestrator, _) = open(temp.path());
    let remaining = orchestrator.list_by_type(ArtifactType::Code).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_ne!(remaining[0].id, id);
    assert_eq!(orchestrator.get(id).await.unwrap_err().code(), "NOT_FOUND");
}

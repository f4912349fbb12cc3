//! Append-only lifecycle journal.
//!
//! Events are stored as newline-delimited JSON (JSONL) so the history can be
//! inspected with ordinary text tools.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::domain::{ArtifactId, LifecycleEvent};

/// File-based lifecycle journal using JSONL format
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Open (creating the parent directory) a journal at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create journal directory: {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event to the journal
    pub async fn append(&self, event: &LifecycleEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<LifecycleEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: LifecycleEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// The most recent `limit` events, oldest first
    pub async fn tail(&self, limit: usize) -> Result<Vec<LifecycleEvent>> {
        let mut events = self.replay().await?;
        let skip = events.len().saturating_sub(limit);
        Ok(events.split_off(skip))
    }

    /// Every event concerning one artifact, including transforms it sourced
    pub async fn history_of(&self, artifact_id: ArtifactId) -> Result<Vec<LifecycleEvent>> {
        let events = self.replay().await?;
        Ok(events
            .into_iter()
            .filter(|e| e.artifact_id == artifact_id || e.source_id == Some(artifact_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArtifactType, LifecycleEventType};
    use tempfile::TempDir;

    fn event(artifact_id: ArtifactId, event_type: LifecycleEventType) -> LifecycleEvent {
        LifecycleEvent::new(
            artifact_id,
            ArtifactType::Document,
            event_type,
            format!("{} document", event_type),
        )
    }

    #[tokio::test]
    async fn test_append_and_replay_in_order() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::open(temp.path().join("nested/journal.jsonl")).await.unwrap();
        let id = ArtifactId::new();

        journal.append(&event(id, LifecycleEventType::Created)).await.unwrap();
        journal.append(&event(id, LifecycleEventType::Updated)).await.unwrap();
        journal.append(&event(id, LifecycleEventType::Deleted)).await.unwrap();

        let types: Vec<_> = journal
            .replay()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                LifecycleEventType::Created,
                LifecycleEventType::Updated,
                LifecycleEventType::Deleted
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_journal_replays_empty() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::open(temp.path().join("journal.jsonl")).await.unwrap();
        assert!(journal.replay().await.unwrap().is_empty());
        assert!(journal.tail(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tail_keeps_most_recent() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::open(temp.path().join("journal.jsonl")).await.unwrap();
        let ids: Vec<_> = (0..5).map(|_| ArtifactId::new()).collect();
        for id in &ids {
            journal.append(&event(*id, LifecycleEventType::Created)).await.unwrap();
        }

        let tail = journal.tail(2).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].artifact_id, ids[3]);
        assert_eq!(tail[1].artifact_id, ids[4]);
    }

    #[tokio::test]
    async fn test_history_includes_transforms_sourced() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::open(temp.path().join("journal.jsonl")).await.unwrap();
        let source = ArtifactId::new();
        let derived = ArtifactId::new();

        journal.append(&event(source, LifecycleEventType::Created)).await.unwrap();
        journal
            .append(&event(derived, LifecycleEventType::Transformed).with_source(source))
            .await
            .unwrap();
        journal.append(&event(ArtifactId::new(), LifecycleEventType::Created)).await.unwrap();

        assert_eq!(journal.history_of(source).await.unwrap().len(), 2);
        assert_eq!(journal.history_of(derived).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journal.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        let journal = Journal::open(&path).await.unwrap();
        let err = journal.replay().await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse event"));
    }
}

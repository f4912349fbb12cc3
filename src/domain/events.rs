//! Lifecycle events recorded in the journal.
//!
//! Each successful create/update/transform/delete appends one event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::{ArtifactId, ArtifactType};

/// A single entry in the append-only lifecycle journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The artifact this event concerns
    pub artifact_id: ArtifactId,

    /// Type of the artifact at the time of the event
    pub artifact_type: ArtifactType,

    /// What happened
    pub event_type: LifecycleEventType,

    /// Human-readable summary (NO content bodies)
    pub summary: String,

    /// Source artifact of a transform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<ArtifactId>,

    /// Time taken in milliseconds
    pub duration_ms: Option<u64>,
}

impl LifecycleEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        artifact_id: ArtifactId,
        artifact_type: ArtifactType,
        event_type: LifecycleEventType,
        summary: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            artifact_id,
            artifact_type,
            event_type,
            summary,
            source_id: None,
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_source(mut self, source_id: ArtifactId) -> Self {
        self.source_id = Some(source_id);
        self
    }
}

/// Types of lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventType {
    Created,
    Updated,
    /// A new artifact was produced from another
    Transformed,
    Deleted,
}

impl std::fmt::Display for LifecycleEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Transformed => write!(f, "transformed"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

//! Domain types for artifex.
//!
//! This module contains the core data structures:
//! - Artifact: the tagged content unit and its envelope
//! - Events: lifecycle journal entries

pub mod artifact;
pub mod events;

// Re-export commonly used types
pub use artifact::{
    Artifact, ArtifactContent, ArtifactId, ArtifactMetadata, ArtifactType, Capabilities,
    ContentModel,
};
pub use events::{LifecycleEvent, LifecycleEventType};

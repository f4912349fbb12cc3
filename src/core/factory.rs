//! Type-indexed constructor lookup.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::domain::{Artifact, ArtifactType};
use crate::error::{ArtifactError, Result};

use super::payload::{merge_into, payload_type};

/// Produces a fresh, empty artifact of one type
pub type Constructor = Arc<dyn Fn() -> Artifact + Send + Sync>;

/// Maps type tags to constructors
#[derive(Default)]
pub struct TypeFactory {
    constructors: HashMap<ArtifactType, Constructor>,
}

impl TypeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, replacing any previous one for the tag
    pub fn register(&mut self, artifact_type: ArtifactType, constructor: Constructor) {
        if self.constructors.insert(artifact_type, constructor).is_some() {
            debug!(%artifact_type, "Replacing constructor");
        }
    }

    pub fn contains(&self, artifact_type: ArtifactType) -> bool {
        self.constructors.contains_key(&artifact_type)
    }

    /// Fresh, empty instance of a registered type
    pub fn create(&self, artifact_type: ArtifactType) -> Result<Artifact> {
        let constructor = self.constructors.get(&artifact_type).ok_or_else(|| {
            ArtifactError::ConstructorNotFound {
                tag: artifact_type.to_string(),
            }
        })?;
        Ok(constructor())
    }

    /// Fresh instance by tag string; unknown tags have no constructor
    pub fn create_by_tag(&self, tag: &str) -> Result<Artifact> {
        self.create(tag.parse()?)
    }

    /// Construct from a payload and validate the result.
    ///
    /// The payload's fields are copied onto a fresh instance of its `type`,
    /// then the instance's own structural validation runs. A payload carrying
    /// an `id` keeps that identity.
    pub fn create_from_payload(&self, payload: &Value) -> Result<Artifact> {
        let artifact_type = payload_type(payload)?;
        let fresh = self.create(artifact_type)?;

        let mut merged = fresh.to_payload()?;
        merge_into(&mut merged, payload);

        let artifact: Artifact = serde_json::from_value(merged).map_err(|e| {
            ArtifactError::invalid_payload(format!(
                "payload does not match the {} shape: {}",
                artifact_type, e
            ))
        })?;

        artifact.validate()?;
        Ok(artifact)
    }
}

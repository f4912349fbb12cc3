//! Error taxonomy for the artifact framework.
//!
//! Configuration errors indicate a broken plugin module and are surfaced at
//! registration or first use. Validation errors carry one failure per
//! rejecting rule. Collaborator errors (generation, persistence) are passed
//! through unchanged and never retried here.

use std::fmt;

use thiserror::Error;

use crate::domain::{ArtifactId, ArtifactType};

/// Result alias used throughout the framework core
pub type Result<T, E = ArtifactError> = std::result::Result<T, E>;

/// A single rejected validation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Name of the rule that rejected the payload
    pub rule: String,

    /// Human-readable reason
    pub message: String,
}

impl ValidationFailure {
    pub fn new(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.rule)
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Plugin '{plugin_id}' has invalid metadata: {reason}")]
    InvalidPluginMetadata { plugin_id: String, reason: String },

    #[error("Plugin '{plugin_id}' is already registered")]
    DuplicatePlugin { plugin_id: String },

    #[error("Plugin '{plugin_id}' does not declare an artifact type")]
    MissingArtifactType { plugin_id: String },

    #[error("Plugin '{plugin_id}' is missing required methods: {}", methods.join(", "))]
    MissingRequiredMethods {
        plugin_id: String,
        methods: Vec<&'static str>,
    },

    #[error("No constructor registered for artifact type '{tag}'")]
    ConstructorNotFound { tag: String },

    #[error("No validation rules registered for artifact type '{artifact_type}'")]
    NoValidationRules { artifact_type: ArtifactType },

    #[error("Validation failed for {artifact_type}: {}", join_failures(failures))]
    Validation {
        artifact_type: ArtifactType,
        failures: Vec<ValidationFailure>,
    },

    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("Artifact {id} not found")]
    NotFound { id: ArtifactId },

    #[error("Artifact type '{artifact_type}' cannot be exported as {format}")]
    UnsupportedExport {
        artifact_type: ArtifactType,
        format: String,
    },

    #[error("Batch of {size} {artifact_type} payloads exceeds the limit of {limit}")]
    BatchTooLarge {
        artifact_type: ArtifactType,
        size: usize,
        limit: usize,
    },

    #[error("Generation service failed: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("Persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn join_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ArtifactError {
    /// Build a validation error from a single failure
    pub fn validation(artifact_type: ArtifactType, failure: ValidationFailure) -> Self {
        Self::Validation {
            artifact_type,
            failures: vec![failure],
        }
    }

    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPluginMetadata { .. } => "INVALID_PLUGIN_METADATA",
            Self::DuplicatePlugin { .. } => "DUPLICATE_PLUGIN",
            Self::MissingArtifactType { .. } => "MISSING_ARTIFACT_TYPE",
            Self::MissingRequiredMethods { .. } => "MISSING_REQUIRED_METHODS",
            Self::ConstructorNotFound { .. } => "CONSTRUCTOR_NOT_FOUND",
            Self::NoValidationRules { .. } => "NO_VALIDATION_RULES",
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::InvalidPayload { .. } => "INVALID_PAYLOAD",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::UnsupportedExport { .. } => "UNSUPPORTED_EXPORT",
            Self::BatchTooLarge { .. } => "BATCH_TOO_LARGE",
            Self::Generation(_) => "GENERATION_FAILED",
            Self::Persistence(_) => "PERSISTENCE_FAILED",
            Self::Serialization(_) => "SERIALIZATION_FAILED",
        }
    }

    /// Configuration errors point at a broken plugin module, not bad input
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPluginMetadata { .. }
                | Self::DuplicatePlugin { .. }
                | Self::MissingArtifactType { .. }
                | Self::MissingRequiredMethods { .. }
                | Self::ConstructorNotFound { .. }
                | Self::NoValidationRules { .. }
        )
    }

    /// Validation failures, if this is a validation error
    pub fn failures(&self) -> &[ValidationFailure] {
        match self {
            Self::Validation { failures, .. } => failures,
            _ => &[],
        }
    }
}

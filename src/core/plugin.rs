//! The plugin contract.
//!
//! A plugin is the unit of extension: it governs exactly one artifact type and
//! supplies the factory, the validation rules, and optionally lifecycle hooks
//! and descriptive capabilities for it. The [`PluginManager`] wires plugins
//! into the factory and validation registry; nothing else enumerates them.
//!
//! [`PluginManager`]: super::plugin_manager::PluginManager

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Artifact, ArtifactType};
use crate::error::{ArtifactError, Result};

use super::validation::ValidationRule;

/// Identity and target of a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Globally unique, stable identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The single artifact type this plugin governs
    #[serde(default)]
    pub artifact_type: Option<ArtifactType>,
}

impl PluginManifest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, artifact_type: ArtifactType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: None,
            artifact_type: Some(artifact_type),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// How many payloads of one type may be created in one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Largest accepted batch
    pub max_batch_size: usize,

    /// Creates in flight at once
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50,
            concurrency: 4,
        }
    }
}

/// Output formats an artifact can be exported to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// The flat payload; supported by every type
    Json,
    Markdown,
    Html,
    Csv,
    Mermaid,
    /// Raw source text
    Source,
    /// A shell command reproducing a remote call
    Curl,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Csv => "csv",
            Self::Mermaid => "mermaid",
            Self::Source => "source",
            Self::Curl => "curl",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "csv" => Ok(Self::Csv),
            "mermaid" | "mmd" => Ok(Self::Mermaid),
            "source" | "raw" => Ok(Self::Source),
            "curl" => Ok(Self::Curl),
            other => Err(ArtifactError::invalid_payload(format!(
                "unknown export format '{}'",
                other
            ))),
        }
    }
}

/// Contract every artifact plugin satisfies
#[async_trait]
pub trait ArtifactPlugin: Send + Sync {
    fn manifest(&self) -> &PluginManifest;

    /// Factory: a fresh, empty instance of the governed type
    fn create_instance(&self) -> Artifact;

    /// Rules appended to the validation registry at registration
    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>>;

    fn id(&self) -> &str {
        &self.manifest().id
    }

    /// Runs before construction; may synthesize missing content
    async fn before_create(&self, payload: Value) -> Result<Value> {
        Ok(payload)
    }

    async fn after_create(&self, payload: Value) -> Result<Value> {
        Ok(payload)
    }

    /// Runs on the source plugin before conversion
    async fn before_transform(&self, payload: Value, _target: ArtifactType) -> Result<Value> {
        Ok(payload)
    }

    /// Runs on the target plugin over the converted payload
    async fn after_transform(&self, payload: Value, _source: ArtifactType) -> Result<Value> {
        Ok(payload)
    }

    /// Runs on an update's merged payload before the pipeline.
    ///
    /// `changes` is what the caller sent. Plugins that generate content drop
    /// it here when its source changed, so `before_create` produces it again.
    async fn before_update(&self, _previous: &Artifact, _changes: &Value, merged: Value) -> Result<Value> {
        Ok(merged)
    }

    /// Runs after an update is stored, with the revision it replaced
    async fn after_replace(&self, _previous: &Artifact, _current: &Artifact) -> Result<()> {
        Ok(())
    }

    /// Release what the hooks stored for a payload that was never persisted.
    ///
    /// `original` is the payload as it entered the pipeline, `attempted` as it
    /// stood when the operation failed.
    async fn discard(&self, _original: &Value, _attempted: &Value) -> Result<()> {
        Ok(())
    }

    /// Release anything the artifact owns outside the collection
    async fn cleanup(&self, _artifact: &Artifact) -> Result<()> {
        Ok(())
    }

    /// JSON Schema describing the variant fields
    fn schema(&self) -> Option<Value> {
        None
    }

    fn batch_config(&self) -> Option<BatchConfig> {
        None
    }

    /// Formats beyond JSON this plugin can render
    fn export_formats(&self) -> Vec<ExportFormat> {
        Vec::new()
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        Err(unsupported_export(artifact, format))
    }
}

/// Error for a format the artifact's plugin does not render
pub fn unsupported_export(artifact: &Artifact, format: ExportFormat) -> ArtifactError {
    ArtifactError::UnsupportedExport {
        artifact_type: artifact.artifact_type(),
        format: format.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_yaml_without_type() {
        let yaml = r#"
id: custom-plugin
name: Custom
version: "0.2.0"
"#;
        let manifest: PluginManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(manifest.id, "custom-plugin");
        assert!(manifest.artifact_type.is_none());
    }

    #[test]
    fn test_manifest_builder() {
        let manifest = PluginManifest::new("document-plugin", "Document", ArtifactType::Document)
            .with_description("Markdown documents");
        assert_eq!(manifest.artifact_type, Some(ArtifactType::Document));
        assert_eq!(manifest.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("docx".parse::<ExportFormat>().is_err());
    }
}

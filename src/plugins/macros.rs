//! Macros: ordered steps, each producing an artifact of some type.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::plugin::{unsupported_export, ArtifactPlugin, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, StructuralRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroStep {
    pub instruction: String,

    /// Tag of the artifact the step produces
    #[serde(rename = "type")]
    pub artifact_type: String,
}

impl MacroStep {
    pub fn target(&self) -> Option<ArtifactType> {
        ArtifactType::from_tag(&self.artifact_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroContent {
    pub steps: Vec<MacroStep>,
}

impl ContentModel for MacroContent {
    const TYPE: ArtifactType = ArtifactType::Macro;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        if self.steps.is_empty() {
            return Err(ValidationFailure::new("structure", "macro needs at least one step"));
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.instruction.trim().is_empty() {
                return Err(ValidationFailure::new(
                    "structure",
                    format!("step {} has no instruction", index + 1),
                ));
            }
            if step.target().is_none() {
                return Err(ValidationFailure::new(
                    "structure",
                    format!("step {} has unknown type '{}'", index + 1, step.artifact_type),
                ));
            }
        }
        Ok(())
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Macro(self)
    }
}

pub struct MacroPlugin {
    manifest: PluginManifest,
}

impl MacroPlugin {
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("macro-plugin", "Macro", ArtifactType::Macro)
                .with_description("Recorded sequences of artifact-producing steps"),
        }
    }
}

impl Default for MacroPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactPlugin for MacroPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(MacroContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![
            Arc::new(RequiredFields::new(&[("steps", FieldKind::Array)])),
            Arc::new(StructuralRule::<MacroContent>::new()),
        ]
    }

    fn schema(&self) -> Option<Value> {
        let tags: Vec<_> = ArtifactType::ALL.iter().map(|t| t.as_str()).collect();
        Some(json!({
            "type": "object",
            "required": ["steps"],
            "properties": {
                "steps": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["instruction", "type"],
                        "properties": {
                            "instruction": { "type": "string", "minLength": 1 },
                            "type": { "enum": tags }
                        }
                    }
                }
            }
        }))
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Markdown]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let content = match (&artifact.content, format) {
            (ArtifactContent::Macro(content), ExportFormat::Markdown) => content,
            _ => return Err(unsupported_export(artifact, format)),
        };

        Ok(content
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. **{}**: {}\n", i + 1, step.artifact_type, step.instruction))
            .collect())
    }
}

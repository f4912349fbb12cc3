//! Diagrams in Mermaid notation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::plugin::{unsupported_export, ArtifactPlugin, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, StructuralRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

/// Keywords a Mermaid definition may open with
const MERMAID_KEYWORDS: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "stateDiagram-v2",
    "erDiagram",
    "journey",
    "gantt",
    "pie",
    "quadrantChart",
    "requirementDiagram",
    "gitGraph",
    "mindmap",
    "timeline",
    "sankey-beta",
    "xychart-beta",
    "block-beta",
    "C4Context",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramContent {
    /// Mermaid source
    pub source: String,
}

impl DiagramContent {
    /// Opening keyword, skipping blank lines and `%%` comments
    pub fn keyword(&self) -> Option<&str> {
        self.source
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with("%%"))
            .and_then(|line| line.split_whitespace().next())
    }
}

impl ContentModel for DiagramContent {
    const TYPE: ArtifactType = ArtifactType::Diagram;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        match self.keyword() {
            None => Err(ValidationFailure::new("structure", "'source' must not be empty")),
            Some(keyword) if MERMAID_KEYWORDS.contains(&keyword) => Ok(()),
            Some(keyword) => Err(ValidationFailure::new(
                "structure",
                format!("'{}' is not a Mermaid diagram type", keyword),
            )),
        }
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Diagram(self)
    }
}

pub struct DiagramPlugin {
    manifest: PluginManifest,
}

impl DiagramPlugin {
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("diagram-plugin", "Diagram", ArtifactType::Diagram)
                .with_description("Flowcharts, sequence diagrams and friends in Mermaid"),
        }
    }
}

impl Default for DiagramPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactPlugin for DiagramPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(DiagramContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![
            Arc::new(RequiredFields::new(&[("source", FieldKind::NonEmptyString)])),
            Arc::new(StructuralRule::<DiagramContent>::new()),
        ]
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Mermaid, ExportFormat::Markdown]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let diagram = match &artifact.content {
            ArtifactContent::Diagram(diagram) => diagram,
            _ => return Err(unsupported_export(artifact, format)),
        };
        let source = diagram.source.trim();

        match format {
            ExportFormat::Mermaid => Ok(format!("{}\n", source)),
            ExportFormat::Markdown => Ok(format!("```mermaid\n{}\n```\n", source)),
            other => Err(unsupported_export(artifact, other)),
        }
    }
}

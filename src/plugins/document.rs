//! Rich-text documents.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::plugin::{unsupported_export, ArtifactPlugin, BatchConfig, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, StructuralRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

use super::{escape_html, require_text};

/// Markup the document body is written in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Markdown,
    Plain,
    Html,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentContent {
    pub content: String,
    pub format: DocumentFormat,
}

impl ContentModel for DocumentContent {
    const TYPE: ArtifactType = ArtifactType::Document;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        require_text("structure", "content", &self.content)
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Document(self)
    }
}

pub struct DocumentPlugin {
    manifest: PluginManifest,
}

impl DocumentPlugin {
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("document-plugin", "Document", ArtifactType::Document)
                .with_description("Markdown, plain text and HTML documents"),
        }
    }
}

impl Default for DocumentPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn content_of(artifact: &Artifact) -> Option<&DocumentContent> {
    match &artifact.content {
        ArtifactContent::Document(content) => Some(content),
        _ => None,
    }
}

/// Blank-line separated paragraphs as `<p>` elements
fn paragraphs_to_html(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p).replace('\n', "<br>\n")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ArtifactPlugin for DocumentPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(DocumentContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![
            Arc::new(RequiredFields::new(&[("content", FieldKind::NonEmptyString)])),
            Arc::new(StructuralRule::<DocumentContent>::new()),
        ]
    }

    fn schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "required": ["content"],
            "properties": {
                "content": { "type": "string", "minLength": 1 },
                "format": { "enum": ["markdown", "plain", "html"], "default": "markdown" }
            }
        }))
    }

    fn batch_config(&self) -> Option<BatchConfig> {
        Some(BatchConfig {
            max_batch_size: 100,
            concurrency: 8,
        })
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Markdown, ExportFormat::Html]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let content = content_of(artifact).ok_or_else(|| unsupported_export(artifact, format))?;

        match format {
            ExportFormat::Markdown => Ok(match &artifact.title {
                Some(title) => format!("# {}\n\n{}\n", title, content.content.trim_end()),
                None => format!("{}\n", content.content.trim_end()),
            }),
            ExportFormat::Html => {
                let body = match content.format {
                    DocumentFormat::Html => content.content.clone(),
                    DocumentFormat::Markdown | DocumentFormat::Plain => {
                        paragraphs_to_html(&content.content)
                    }
                };
                let heading = artifact
                    .title
                    .as_deref()
                    .map(|t| format!("<h1>{}</h1>\n", escape_html(t)))
                    .unwrap_or_default();
                Ok(format!("<article>\n{}{}\n</article>\n", heading, body))
            }
            other => Err(unsupported_export(artifact, other)),
        }
    }
}

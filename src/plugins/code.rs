//! Source code snippets.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::plugin::{unsupported_export, ArtifactPlugin, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, StructuralRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

use super::require_text;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeContent {
    pub language: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl ContentModel for CodeContent {
    const TYPE: ArtifactType = ArtifactType::Code;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        require_text("structure", "language", &self.language)?;
        require_text("structure", "code", &self.code)
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Code(self)
    }
}

pub struct CodePlugin {
    manifest: PluginManifest,
}

impl CodePlugin {
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("code-plugin", "Code", ArtifactType::Code)
                .with_description("Source files and snippets"),
        }
    }
}

impl Default for CodePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactPlugin for CodePlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(CodeContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![
            Arc::new(RequiredFields::new(&[
                ("language", FieldKind::NonEmptyString),
                ("code", FieldKind::NonEmptyString),
            ])),
            Arc::new(StructuralRule::<CodeContent>::new()),
        ]
    }

    /// Language tags are stored lowercase
    async fn after_transform(&self, mut payload: Value, _source: ArtifactType) -> Result<Value> {
        if let Some(language) = payload.get_mut("language") {
            if let Some(tag) = language.as_str() {
                *language = Value::String(tag.trim().to_lowercase());
            }
        }
        Ok(payload)
    }

    fn schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "required": ["language", "code"],
            "properties": {
                "language": { "type": "string", "minLength": 1 },
                "code": { "type": "string", "minLength": 1 },
                "filename": { "type": "string" }
            }
        }))
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Source, ExportFormat::Markdown]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let code = match &artifact.content {
            ArtifactContent::Code(code) => code,
            _ => return Err(unsupported_export(artifact, format)),
        };
        let body = code.code.trim_end();

        match format {
            ExportFormat::Source => Ok(format!("{}\n", body)),
            ExportFormat::Markdown => {
                let heading = code
                    .filename
                    .as_deref()
                    .map(|f| format!("`{}`\n\n", f))
                    .unwrap_or_default();
                Ok(format!("{}```{}\n{}\n```\n", heading, code.language, body))
            }
            other => Err(unsupported_export(artifact, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet() -> Artifact {
        Artifact::new(
            CodeContent {
                language: "rust".into(),
                code: "fn main() {}\n\n".into(),
                filename: Some("main.rs".into()),
            }
            .into_content(),
        )
    }

    #[test]
    fn test_both_fields_required() {
        let content = CodeContent {
            language: "python".into(),
            ..Default::default()
        };
        assert_eq!(content.validate().unwrap_err().message, "'code' must not be empty");
    }

    #[test]
    fn test_export_source_and_markdown() {
        let plugin = CodePlugin::new();
        assert_eq!(plugin.export(&snippet(), ExportFormat::Source).unwrap(), "fn main() {}\n");
        assert_eq!(
            plugin.export(&snippet(), ExportFormat::Markdown).unwrap(),
            "`main.rs`\n\n```rust\nfn main() {}\n```\n"
        );
    }

    #[tokio::test]
    async fn test_after_transform_lowercases_language() {
        let payload = CodePlugin::new()
            .after_transform(json!({ "language": " Python ", "code": "x" }), ArtifactType::Document)
            .await
            .unwrap();
        assert_eq!(payload["language"], "python");
    }
}

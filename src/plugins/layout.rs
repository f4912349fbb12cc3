//! Page layouts: an HTML fragment plus optional styles.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::plugin::{unsupported_export, ArtifactPlugin, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, StructuralRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

use super::{escape_html, require_text};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutContent {
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

impl ContentModel for LayoutContent {
    const TYPE: ArtifactType = ArtifactType::Layout;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        require_text("structure", "html", &self.html)
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Layout(self)
    }
}

pub struct LayoutPlugin {
    manifest: PluginManifest,
}

impl LayoutPlugin {
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("layout-plugin", "Layout", ArtifactType::Layout),
        }
    }
}

impl Default for LayoutPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactPlugin for LayoutPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(LayoutContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![
            Arc::new(RequiredFields::new(&[("html", FieldKind::NonEmptyString)])),
            Arc::new(StructuralRule::<LayoutContent>::new()),
        ]
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Html]
    }

    /// Standalone page with the styles inlined
    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let layout = match (&artifact.content, format) {
            (ArtifactContent::Layout(layout), ExportFormat::Html) => layout,
            _ => return Err(unsupported_export(artifact, format)),
        };

        let style = layout
            .css
            .as_deref()
            .filter(|css| !css.trim().is_empty())
            .map(|css| format!("<style>\n{}\n</style>\n", css.trim()))
            .unwrap_or_default();

        Ok(format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{}</head>\n<body>\n{}\n</body>\n</html>\n",
            escape_html(&artifact.display_title()),
            style,
            layout.html.trim()
        ))
    }
}

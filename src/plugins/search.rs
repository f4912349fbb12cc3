//! Saved searches and their results.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::plugin::{unsupported_export, ArtifactPlugin, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, StructuralRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

use super::require_text;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchContent {
    pub query: String,
    pub results: Vec<SearchResult>,
}

impl ContentModel for SearchContent {
    const TYPE: ArtifactType = ArtifactType::Search;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        require_text("structure", "query", &self.query)?;

        if let Some(index) = self.results.iter().position(|r| r.url.trim().is_empty()) {
            return Err(ValidationFailure::new(
                "structure",
                format!("result {} has no url", index + 1),
            ));
        }
        Ok(())
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Search(self)
    }
}

pub struct SearchPlugin {
    manifest: PluginManifest,
}

impl SearchPlugin {
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("search-plugin", "Search", ArtifactType::Search),
        }
    }
}

impl Default for SearchPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactPlugin for SearchPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(SearchContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![
            Arc::new(RequiredFields::new(&[
                ("query", FieldKind::NonEmptyString),
                ("results", FieldKind::Array),
            ])),
            Arc::new(StructuralRule::<SearchContent>::new()),
        ]
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Markdown]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let search = match (&artifact.content, format) {
            (ArtifactContent::Search(search), ExportFormat::Markdown) => search,
            _ => return Err(unsupported_export(artifact, format)),
        };

        let mut out = format!("## Results for \"{}\"\n\n", search.query.trim());
        for result in &search.results {
            let title = if result.title.trim().is_empty() { &result.url } else { &result.title };
            out.push_str(&format!("- [{}]({})", title, result.url));
            if let Some(snippet) = &result.snippet {
                out.push_str(&format!(": {}", snippet));
            }
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_without_url_rejected() {
        let content: SearchContent = serde_json::from_value(json!({
            "query": "rust async",
            "results": [{ "title": "Tokio", "url": "https://tokio.rs" }, { "title": "?" }]
        }))
        .unwrap();
        assert_eq!(content.validate().unwrap_err().message, "result 2 has no url");
    }

    #[test]
    fn test_export_markdown() {
        let plugin = SearchPlugin::new();
        let artifact = Artifact::new(
            SearchContent {
                query: "serde".into(),
                results: vec![SearchResult {
                    title: "serde.rs".into(),
                    url: "https://serde.rs".into(),
                    snippet: Some("Serialization framework".into()),
                }],
            }
            .into_content(),
        );

        assert_eq!(
            plugin.export(&artifact, ExportFormat::Markdown).unwrap(),
            "## Results for \"serde\"\n\n- [serde.rs](https://serde.rs): Serialization framework\n"
        );
    }
}

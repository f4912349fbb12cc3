//! Step-by-step reasoning over a prompt.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::{GenerationRequest, GenerationService};
use crate::core::payload::{as_object_mut, set_metadata_field, str_field};
use crate::core::plugin::{unsupported_export, ArtifactPlugin, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

use super::{clear_stale, generate, require_text};

const REASONING_INSTRUCTION: &str =
    "Think through the following step by step. Finish with a final paragraph stating your conclusion.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThinkContent {
    pub prompt: String,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
}

impl ContentModel for ThinkContent {
    const TYPE: ArtifactType = ArtifactType::Think;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        require_text("structure", "prompt", &self.prompt)?;
        require_text("structure", "reasoning", &self.reasoning)
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Think(self)
    }
}

/// Last paragraph of the reasoning
fn last_paragraph(reasoning: &str) -> Option<&str> {
    reasoning
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .last()
}

pub struct ThinkPlugin {
    manifest: PluginManifest,
    generator: Option<Arc<dyn GenerationService>>,
}

impl ThinkPlugin {
    pub fn new(generator: Option<Arc<dyn GenerationService>>) -> Self {
        Self {
            manifest: PluginManifest::new("think-plugin", "Think", ArtifactType::Think),
            generator,
        }
    }
}

#[async_trait]
impl ArtifactPlugin for ThinkPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(ThinkContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![Arc::new(RequiredFields::new(&[("prompt", FieldKind::NonEmptyString)]))]
    }

    async fn before_create(&self, mut payload: Value) -> Result<Value> {
        if str_field(&payload, "reasoning").is_some() {
            return Ok(payload);
        }
        let prompt = match str_field(&payload, "prompt") {
            Some(prompt) => prompt.to_string(),
            None => return Ok(payload),
        };

        let reasoning = generate(
            self.generator.as_ref(),
            GenerationRequest::new(ArtifactType::Think, REASONING_INSTRUCTION).with_context(prompt.clone()),
        )
        .await?;

        let has_conclusion = str_field(&payload, "conclusion").is_some();
        let object = as_object_mut(&mut payload)?;
        if !has_conclusion {
            if let Some(conclusion) = last_paragraph(&reasoning) {
                object.insert("conclusion".to_string(), Value::String(conclusion.to_string()));
            }
        }
        object.insert("reasoning".to_string(), Value::String(reasoning));
        set_metadata_field(&mut payload, "source_prompt", Value::String(prompt))?;
        Ok(payload)
    }

    async fn before_update(&self, previous: &Artifact, changes: &Value, mut merged: Value) -> Result<Value> {
        clear_stale(previous, changes, &mut merged, "prompt", &["reasoning", "conclusion"])?;
        Ok(merged)
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Markdown]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let think = match (&artifact.content, format) {
            (ArtifactContent::Think(think), ExportFormat::Markdown) => think,
            _ => return Err(unsupported_export(artifact, format)),
        };

        let mut out = format!("> {}\n\n{}\n", think.prompt.trim(), think.reasoning.trim());
        if let Some(conclusion) = &think.conclusion {
            out.push_str(&format!("\n**Conclusion:** {}\n", conclusion.trim()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticGenerator;
    use serde_json::json;

    #[tokio::test]
    async fn test_reasoning_and_conclusion_generated() {
        let generator = Arc::new(StaticGenerator::new().with_response(
            ArtifactType::Think,
            "Primes above 2 are odd.\n\nSo the sum of two is even.",
        ));
        let plugin = ThinkPlugin::new(Some(generator.clone()));

        let payload = plugin
            .before_create(json!({ "type": "think", "prompt": "Is the sum of two odd primes even?" }))
            .await
            .unwrap();

        assert_eq!(payload["conclusion"], "So the sum of two is even.");
        assert!(payload["reasoning"].as_str().unwrap().starts_with("Primes"));

        let requests = generator.requests();
        assert_eq!(requests[0].context.as_deref(), Some("Is the sum of two odd primes even?"));
    }

    #[test]
    fn test_last_paragraph() {
        assert_eq!(last_paragraph("a\n\nb\n\n  "), Some("b"));
        assert_eq!(last_paragraph("   "), None);
    }
}

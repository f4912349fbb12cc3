//! Single question and answer exchanges.

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

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AskContent {
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ContentModel for AskContent {
    const TYPE: ArtifactType = ArtifactType::Ask;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        require_text("structure", "question", &self.question)?;
        require_text("structure", "answer", &self.answer)
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Ask(self)
    }
}

pub struct AskPlugin {
    manifest: PluginManifest,
    generator: Option<Arc<dyn GenerationService>>,
}

impl AskPlugin {
    pub fn new(generator: Option<Arc<dyn GenerationService>>) -> Self {
        Self {
            manifest: PluginManifest::new("ask-plugin", "Ask", ArtifactType::Ask)
                .with_description("Questions answered by the generation service"),
            generator,
        }
    }
}

#[async_trait]
impl ArtifactPlugin for AskPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(AskContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![Arc::new(RequiredFields::new(&[("question", FieldKind::NonEmptyString)]))]
    }

    async fn before_create(&self, mut payload: Value) -> Result<Value> {
        if str_field(&payload, "answer").is_some() {
            return Ok(payload);
        }
        let question = match str_field(&payload, "question") {
            Some(question) => question.to_string(),
            None => return Ok(payload),
        };

        let answer = generate(
            self.generator.as_ref(),
            GenerationRequest::new(ArtifactType::Ask, question),
        )
        .await?;

        as_object_mut(&mut payload)?.insert("answer".to_string(), Value::String(answer));
        Ok(payload)
    }

    async fn before_update(&self, previous: &Artifact, changes: &Value, mut merged: Value) -> Result<Value> {
        clear_stale(previous, changes, &mut merged, "question", &["answer"])?;
        Ok(merged)
    }

    /// The question is the prompt the answer came from
    async fn after_create(&self, mut payload: Value) -> Result<Value> {
        if let Some(question) = str_field(&payload, "question").map(str::to_string) {
            set_metadata_field(&mut payload, "source_prompt", Value::String(question))?;
        }
        Ok(payload)
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Markdown]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        match (&artifact.content, format) {
            (ArtifactContent::Ask(ask), ExportFormat::Markdown) => Ok(format!(
                "**Q:** {}\n\n{}\n",
                ask.question.trim(),
                ask.answer.trim()
            )),
            _ => Err(unsupported_export(artifact, format)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticGenerator;
    use serde_json::json;

    #[tokio::test]
    async fn test_answer_is_generated() {
        let generator = Arc::new(StaticGenerator::new().with_response(ArtifactType::Ask, "Rayleigh scattering."));
        let plugin = AskPlugin::new(Some(generator));

        let payload = plugin
            .before_create(json!({ "type": "ask", "question": "Why is the sky blue?" }))
            .await
            .unwrap();
        assert_eq!(payload["answer"], "Rayleigh scattering.");

        let payload = plugin.after_create(payload).await.unwrap();
        assert_eq!(payload["metadata"]["source_prompt"], "Why is the sky blue?");
    }

    #[tokio::test]
    async fn test_supplied_answer_skips_generation() {
        let generator = Arc::new(StaticGenerator::failing("must not be called"));
        let plugin = AskPlugin::new(Some(generator.clone()));

        let payload = json!({ "type": "ask", "question": "2+2?", "answer": "4" });
        assert_eq!(plugin.before_create(payload.clone()).await.unwrap(), payload);
        assert!(generator.requests().is_empty());
    }
}

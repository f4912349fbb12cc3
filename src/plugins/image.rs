//! Generated images.
//!
//! Callers usually supply only a prompt; `before_create` asks the generation
//! service for the image and records where it lives. A payload that already
//! carries an `image_url` is taken as is.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::{GenerationRequest, GenerationService};
use crate::core::payload::{as_object_mut, set_metadata_field, str_field};
use crate::core::plugin::{unsupported_export, ArtifactPlugin, ExportFormat, PluginManifest};
use crate::core::validation::{FnRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

use super::{clear_stale, escape_html, generate, require_text};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageContent {
    pub prompt: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ContentModel for ImageContent {
    const TYPE: ArtifactType = ArtifactType::Image;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        require_text("structure", "image_url", &self.image_url)
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Image(self)
    }
}

pub struct ImagePlugin {
    manifest: PluginManifest,
    generator: Option<Arc<dyn GenerationService>>,
}

impl ImagePlugin {
    pub fn new(generator: Option<Arc<dyn GenerationService>>) -> Self {
        Self {
            manifest: PluginManifest::new("image-plugin", "Image", ArtifactType::Image)
                .with_description("Images generated from a prompt"),
            generator,
        }
    }
}

#[async_trait]
impl ArtifactPlugin for ImagePlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(ImageContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![Arc::new(FnRule::new("prompt-or-url", |payload| {
            if str_field(payload, "prompt").is_some() || str_field(payload, "image_url").is_some() {
                Ok(())
            } else {
                Err("image needs a 'prompt' or an 'image_url'".to_string())
            }
        }))]
    }

    async fn before_create(&self, mut payload: Value) -> Result<Value> {
        if str_field(&payload, "image_url").is_some() {
            return Ok(payload);
        }
        let prompt = match str_field(&payload, "prompt") {
            Some(prompt) => prompt.to_string(),
            None => return Ok(payload),
        };

        let url = generate(
            self.generator.as_ref(),
            GenerationRequest::new(ArtifactType::Image, prompt.clone()),
        )
        .await?;

        let object = as_object_mut(&mut payload)?;
        object.insert("image_url".to_string(), Value::String(url));
        if !object.get("alt_text").map(Value::is_string).unwrap_or(false) {
            object.insert("alt_text".to_string(), Value::String(prompt.clone()));
        }
        set_metadata_field(&mut payload, "source_prompt", Value::String(prompt))?;
        Ok(payload)
    }

    async fn before_update(&self, previous: &Artifact, changes: &Value, mut merged: Value) -> Result<Value> {
        if !clear_stale(previous, changes, &mut merged, "prompt", &["image_url"])? {
            return Ok(merged);
        }

        // Alt text that was filled in from the old prompt follows it
        if let ArtifactContent::Image(image) = &previous.content {
            if changes.get("alt_text").is_none() && image.alt_text.as_deref() == Some(image.prompt.as_str()) {
                as_object_mut(&mut merged)?.remove("alt_text");
            }
        }
        Ok(merged)
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Markdown, ExportFormat::Html]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let image = match &artifact.content {
            ArtifactContent::Image(image) => image,
            _ => return Err(unsupported_export(artifact, format)),
        };
        let alt = image.alt_text.as_deref().unwrap_or(&image.prompt);

        match format {
            ExportFormat::Markdown => Ok(format!("![{}]({})\n", alt, image.image_url)),
            ExportFormat::Html => {
                let mut tag = format!(
                    "<img src=\"{}\" alt=\"{}\"",
                    escape_html(&image.image_url),
                    escape_html(alt)
                );
                if let Some(width) = image.width {
                    tag.push_str(&format!(" width=\"{}\"", width));
                }
                if let Some(height) = image.height {
                    tag.push_str(&format!(" height=\"{}\"", height));
                }
                tag.push_str(">\n");
                Ok(tag)
            }
            other => Err(unsupported_export(artifact, other)),
        }
    }
}

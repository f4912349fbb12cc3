//! Content conversion strategies for transforms.
//!
//! How one artifact type's content becomes another's is variant-specific, so
//! the orchestrator takes the strategy from the caller as a
//! [`ContentConverter`]. The plugins' transform hooks run around it.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::adapters::{GenerationRequest, GenerationService};
use crate::domain::ArtifactType;
use crate::error::{ArtifactError, Result};

use super::payload::payload_type;

/// Produces a target-shaped payload from a source payload
#[async_trait]
pub trait ContentConverter: Send + Sync {
    async fn convert(&self, source: &Value, target: ArtifactType) -> Result<Value>;
}

type ConvertFn = dyn Fn(&Value, ArtifactType) -> Result<Value> + Send + Sync;

/// Converter backed by a synchronous closure
pub struct FnConverter {
    convert: Box<ConvertFn>,
}

impl FnConverter {
    pub fn new<F>(convert: F) -> Self
    where
        F: Fn(&Value, ArtifactType) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            convert: Box::new(convert),
        }
    }
}

#[async_trait]
impl ContentConverter for FnConverter {
    async fn convert(&self, source: &Value, target: ArtifactType) -> Result<Value> {
        (self.convert)(source, target)
    }
}

/// Asks the generation service to rewrite the content as the target type
pub struct GeneratedConversion {
    generator: Arc<dyn GenerationService>,
}

impl GeneratedConversion {
    pub fn new(generator: Arc<dyn GenerationService>) -> Self {
        Self { generator }
    }
}

/// Fields that belong to the envelope rather than the content
const ENVELOPE_FIELDS: [&str; 3] = ["id", "metadata", "type"];

#[async_trait]
impl ContentConverter for GeneratedConversion {
    async fn convert(&self, source: &Value, target: ArtifactType) -> Result<Value> {
        let source_type = payload_type(source)?;

        let mut content = source.clone();
        if let Some(object) = content.as_object_mut() {
            for field in ENVELOPE_FIELDS {
                object.remove(field);
            }
        }

        let prompt = format!(
            "Convert the following {} artifact into a {} artifact. \
             Respond with a single JSON object holding only the {} fields.",
            source_type, target, target
        );
        let request = GenerationRequest::new(target, prompt)
            .with_context(serde_json::to_string_pretty(&content)?);

        let output = self
            .generator
            .complete(&request)
            .await
            .map_err(ArtifactError::Generation)?;

        extract_json_object(&output.content)
            .with_context(|| format!("{} returned no usable {} payload", self.generator.name(), target))
            .map(Value::Object)
            .map_err(ArtifactError::Generation)
    }
}

/// Pull one JSON object out of model output, tolerating code fences and prose
pub fn extract_json_object(text: &str) -> anyhow::Result<Map<String, Value>> {
    let start = text.find('{').context("no '{' in output")?;
    let end = text.rfind('}').context("no '}' in output")?;
    if end < start {
        anyhow::bail!("unbalanced braces in output");
    }

    match serde_json::from_str::<Value>(&text[start..=end]).context("output is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a JSON object, got {}", other),
    }
}

//! Built-in artifact plugins.
//!
//! One module per artifact type, each pairing the variant's content model
//! with the plugin that governs it. [`register_builtin`] wires all fourteen
//! into a [`PluginManager`] in a fixed order.

pub mod ask;
pub mod chat;
pub mod code;
pub mod diagram;
pub mod document;
pub mod form;
pub mod image;
pub mod layout;
pub mod macros;
pub mod remote_call;
pub mod search;
pub mod spreadsheet;
pub mod think;
pub mod voice;

use std::sync::Arc;

use tracing::debug;

use crate::adapters::{GenerationRequest, GenerationService};
use serde_json::Value;

use crate::core::payload::as_object_mut;
use crate::core::plugin::ArtifactPlugin;
use crate::core::plugin_manager::PluginManager;
use crate::domain::Artifact;
use crate::error::{ArtifactError, Result, ValidationFailure};
use crate::store::{BlobStore, MemoryBlobStore};

/// Collaborators the built-in plugins depend on
#[derive(Clone)]
pub struct PluginServices {
    /// Synthesizes content for generated types; absent means those types
    /// must be created with their generated fields already filled
    pub generator: Option<Arc<dyn GenerationService>>,

    /// Holds binary payloads (voice audio)
    pub blobs: Arc<dyn BlobStore>,
}

impl PluginServices {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            generator: None,
            blobs,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn GenerationService>) -> Self {
        self.generator = Some(generator);
        self
    }
}

impl Default for PluginServices {
    fn default() -> Self {
        Self::new(Arc::new(MemoryBlobStore::new()))
    }
}

/// Every built-in plugin, in registration order
pub fn builtin(services: &PluginServices) -> Vec<Arc<dyn ArtifactPlugin>> {
    vec![
        Arc::new(document::DocumentPlugin::new()),
        Arc::new(spreadsheet::SpreadsheetPlugin::new()),
        Arc::new(diagram::DiagramPlugin::new()),
        Arc::new(form::FormPlugin::new()),
        Arc::new(search::SearchPlugin::new()),
        Arc::new(layout::LayoutPlugin::new()),
        Arc::new(image::ImagePlugin::new(services.generator.clone())),
        Arc::new(voice::VoicePlugin::new(
            services.generator.clone(),
            services.blobs.clone(),
        )),
        Arc::new(macros::MacroPlugin::new()),
        Arc::new(code::CodePlugin::new()),
        Arc::new(remote_call::RemoteCallPlugin::new()),
        Arc::new(chat::ChatPlugin::new()),
        Arc::new(ask::AskPlugin::new(services.generator.clone())),
        Arc::new(think::ThinkPlugin::new(services.generator.clone())),
    ]
}

/// Register all built-in plugins
pub fn register_builtin(manager: &mut PluginManager, services: &PluginServices) -> Result<()> {
    manager.register_all(builtin(services))
}

/// Fail with `rule` unless `value` has non-whitespace content
pub(crate) fn require_text(rule: &str, field: &str, value: &str) -> std::result::Result<(), ValidationFailure> {
    if value.trim().is_empty() {
        return Err(ValidationFailure::new(
            rule,
            format!("'{}' must not be empty", field),
        ));
    }
    Ok(())
}

/// Ask the generation service for content, trimmed and non-empty
pub(crate) async fn generate(
    generator: Option<&Arc<dyn GenerationService>>,
    request: GenerationRequest,
) -> Result<String> {
    let generator = generator.ok_or_else(|| {
        ArtifactError::Generation(anyhow::anyhow!(
            "no generation service configured for {} artifacts",
            request.artifact_type
        ))
    })?;

    let output = generator
        .complete(&request)
        .await
        .map_err(ArtifactError::Generation)?;

    debug!(
        service = generator.name(),
        artifact_type = %request.artifact_type,
        tokens = ?output.tokens_used,
        "Generated content"
    );

    let content = output.content.trim();
    if content.is_empty() {
        return Err(ArtifactError::Generation(anyhow::anyhow!(
            "{} returned empty content for {}",
            generator.name(),
            request.artifact_type
        )));
    }
    Ok(content.to_string())
}

/// Drop generated fields from an update's merged payload once their source
/// field changes.
///
/// Fields listed in `derived` that the caller sent in `changes` are kept, as
/// is everything when `source` is unchanged. The recorded source prompt goes
/// with the generated content. Returns whether `source` changed.
pub(crate) fn clear_stale(
    previous: &Artifact,
    changes: &Value,
    merged: &mut Value,
    source: &str,
    derived: &[&str],
) -> Result<bool> {
    let changed = match changes.get(source) {
        Some(value) => previous.to_payload()?.get(source) != Some(value),
        None => false,
    };
    if !changed {
        return Ok(false);
    }

    let object = as_object_mut(merged)?;
    for field in derived {
        if changes.get(*field).is_none() {
            object.remove(*field);
        }
    }
    if let Some(metadata) = object.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.remove("source_prompt");
    }
    debug!(field = source, "Source changed; cleared generated fields");
    Ok(true)
}

/// Escape text for HTML element content and attribute values
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

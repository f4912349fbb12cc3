//! Spoken audio generated from text.
//!
//! The audio itself lives in the blob store; the artifact only keeps the key.
//! Whatever the generation service returns for a voice request is stored
//! verbatim as the blob.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapters::{GenerationRequest, GenerationService};
use crate::core::payload::{as_object_mut, set_metadata_field, str_field};
use crate::core::plugin::{ArtifactPlugin, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{ArtifactError, Result, ValidationFailure};
use crate::store::BlobStore;

use super::{clear_stale, generate, require_text};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceContent {
    /// Text to speak
    pub text: String,

    /// Voice name passed through to the service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Blob key of the audio
    pub audio_ref: String,
}

impl ContentModel for VoiceContent {
    const TYPE: ArtifactType = ArtifactType::Voice;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        require_text("structure", "text", &self.text)?;
        require_text("structure", "audio_ref", &self.audio_ref)
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Voice(self)
    }
}

/// Blob key of a voice artifact's audio
fn audio_ref(artifact: &Artifact) -> Option<&str> {
    match &artifact.content {
        ArtifactContent::Voice(voice) if !voice.audio_ref.is_empty() => Some(&voice.audio_ref),
        _ => None,
    }
}

pub struct VoicePlugin {
    manifest: PluginManifest,
    generator: Option<Arc<dyn GenerationService>>,
    blobs: Arc<dyn BlobStore>,
}

impl VoicePlugin {
    pub fn new(generator: Option<Arc<dyn GenerationService>>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            manifest: PluginManifest::new("voice-plugin", "Voice", ArtifactType::Voice)
                .with_description("Text rendered to speech"),
            generator,
            blobs,
        }
    }

    async fn release(&self, key: &str) -> Result<()> {
        let existed = self
            .blobs
            .delete(key)
            .await
            .map_err(ArtifactError::Persistence)?;
        if existed {
            debug!(key = %key, "Released voice audio");
        } else {
            warn!(key = %key, "Voice audio was already gone");
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactPlugin for VoicePlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(VoiceContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![Arc::new(RequiredFields::new(&[("text", FieldKind::NonEmptyString)]))]
    }

    async fn before_create(&self, mut payload: Value) -> Result<Value> {
        if str_field(&payload, "audio_ref").is_some() {
            return Ok(payload);
        }
        let text = match str_field(&payload, "text") {
            Some(text) => text.to_string(),
            None => return Ok(payload),
        };

        let mut prompt = text.clone();
        if let Some(voice) = str_field(&payload, "voice") {
            prompt = format!("[voice: {}]\n{}", voice, prompt);
        }

        let audio = generate(
            self.generator.as_ref(),
            GenerationRequest::new(ArtifactType::Voice, prompt),
        )
        .await?;

        let key = self
            .blobs
            .put(audio.as_bytes())
            .await
            .map_err(ArtifactError::Persistence)?;
        debug!(key = %key, "Stored voice audio");

        as_object_mut(&mut payload)?.insert("audio_ref".to_string(), Value::String(key));
        set_metadata_field(&mut payload, "source_prompt", Value::String(text))?;
        Ok(payload)
    }

    async fn before_update(&self, previous: &Artifact, changes: &Value, mut merged: Value) -> Result<Value> {
        clear_stale(previous, changes, &mut merged, "text", &["audio_ref"])?;
        Ok(merged)
    }

    /// Release the audio of the replaced revision
    async fn after_replace(&self, previous: &Artifact, current: &Artifact) -> Result<()> {
        match (audio_ref(previous), audio_ref(current)) {
            (Some(old), new) if new != Some(old) => self.release(old).await,
            _ => Ok(()),
        }
    }

    /// Release audio generated for a payload that was never stored
    async fn discard(&self, original: &Value, attempted: &Value) -> Result<()> {
        match str_field(attempted, "audio_ref") {
            Some(key) if str_field(original, "audio_ref") != Some(key) => self.release(key).await,
            _ => Ok(()),
        }
    }

    /// Release the audio blob
    async fn cleanup(&self, artifact: &Artifact) -> Result<()> {
        match audio_ref(artifact) {
            Some(key) => self.release(key).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticGenerator;
    use crate::store::MemoryBlobStore;
    use serde_json::json;

    fn plugin_with(blobs: Arc<MemoryBlobStore>) -> VoicePlugin {
        let generator = StaticGenerator::new().with_response(ArtifactType::Voice, "PCM-DATA");
        VoicePlugin::new(Some(Arc::new(generator)), blobs)
    }

    #[tokio::test]
    async fn test_generated_audio_goes_to_blob_store() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let plugin = plugin_with(blobs.clone());

        let payload = plugin
            .before_create(json!({ "type": "voice", "text": "Good morning" }))
            .await
            .unwrap();

        let key = payload["audio_ref"].as_str().unwrap();
        assert_eq!(blobs.get(key).await.unwrap().unwrap(), b"PCM-DATA");
        assert_eq!(payload["metadata"]["source_prompt"], "Good morning");
    }

    #[tokio::test]
    async fn test_cleanup_releases_blob() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let plugin = plugin_with(blobs.clone());
        let key = blobs.put(b"audio").await.unwrap();

        let artifact = Artifact::new(
            VoiceContent {
                text: "hi".into(),
                voice: None,
                audio_ref: key,
            }
            .into_content(),
        );

        plugin.cleanup(&artifact).await.unwrap();
        assert!(blobs.is_empty());

        // Second cleanup finds nothing and still succeeds
        plugin.cleanup(&artifact).await.unwrap();
    }

    #[tokio::test]
    async fn test_discard_spares_supplied_audio() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let plugin = plugin_with(blobs.clone());
        let supplied = blobs.put(b"uploaded").await.unwrap();

        let original = json!({ "type": "voice", "text": "hi", "audio_ref": supplied.clone() });
        plugin.discard(&original, &original).await.unwrap();
        assert_eq!(blobs.len(), 1);

        let bare = json!({ "type": "voice", "text": "hi" });
        let generated = plugin.before_create(bare.clone()).await.unwrap();
        assert_eq!(blobs.len(), 2);

        plugin.discard(&bare, &generated).await.unwrap();
        assert_eq!(blobs.len(), 1);
        assert!(blobs.get(&supplied).await.unwrap().is_some());
    }

    #[test]
    fn test_audio_ref_required_once_constructed() {
        let content = VoiceContent {
            text: "hi".into(),
            ..Default::default()
        };
        assert!(content.validate().unwrap_err().message.contains("audio_ref"));
    }
}

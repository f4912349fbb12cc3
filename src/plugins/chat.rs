//! Conversations.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::plugin::{unsupported_export, ArtifactPlugin, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, StructuralRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactId, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,

    /// Artifact this message refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<ArtifactId>,

    /// Title of the referenced artifact when the message was last refreshed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatContent {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ContentModel for ChatContent {
    const TYPE: ArtifactType = ArtifactType::Chat;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        if let Some(index) = self.messages.iter().position(|m| m.content.trim().is_empty()) {
            return Err(ValidationFailure::new(
                "structure",
                format!("message {} has no content", index + 1),
            ));
        }
        Ok(())
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Chat(self)
    }
}

pub struct ChatPlugin {
    manifest: PluginManifest,
}

impl ChatPlugin {
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("chat-plugin", "Chat", ArtifactType::Chat),
        }
    }
}

impl Default for ChatPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactPlugin for ChatPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(ChatContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![
            Arc::new(RequiredFields::new(&[("messages", FieldKind::Array)])),
            Arc::new(StructuralRule::<ChatContent>::new()),
        ]
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Markdown]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let chat = match (&artifact.content, format) {
            (ArtifactContent::Chat(chat), ExportFormat::Markdown) => chat,
            _ => return Err(unsupported_export(artifact, format)),
        };

        let mut out = String::new();
        for message in &chat.messages {
            out.push_str(&format!("**{}**: {}\n", message.role, message.content.trim()));
            if let Some(title) = &message.artifact_title {
                out.push_str(&format!("> see: {}\n", title));
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
    fn test_unknown_role_rejected() {
        let result = serde_json::from_value::<ChatContent>(json!({
            "messages": [{ "role": "narrator", "content": "Once upon a time" }]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_message_rejected() {
        let content: ChatContent = serde_json::from_value(json!({
            "messages": [
                { "role": "user", "content": "Hi" },
                { "role": "assistant", "content": "" }
            ]
        }))
        .unwrap();
        assert_eq!(content.validate().unwrap_err().message, "message 2 has no content");
    }

    #[test]
    fn test_export_transcript() {
        let plugin = ChatPlugin::new();
        let artifact = Artifact::new(
            ChatContent {
                messages: vec![
                    ChatMessage {
                        role: Role::User,
                        content: "Make me a table".into(),
                        ..Default::default()
                    },
                    ChatMessage {
                        role: Role::Assistant,
                        content: "Done".into(),
                        artifact_id: Some(ArtifactId::new()),
                        artifact_title: Some("Groceries".into()),
                    },
                ],
                model: None,
            }
            .into_content(),
        );

        assert_eq!(
            plugin.export(&artifact, ExportFormat::Markdown).unwrap(),
            "**user**: Make me a table\n\n**assistant**: Done\n> see: Groceries\n\n"
        );
    }
}

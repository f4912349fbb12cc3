//! The artifact model.
//!
//! An artifact is one tagged unit of generated content. The shared envelope
//! (identity, title, metadata) is common to every variant; the variant-specific
//! fields live in [`ArtifactContent`], a closed sum type with one arm per
//! [`ArtifactType`]. Serialized, an artifact is a single flat JSON object:
//!
//! ```json
//! { "id": "…", "type": "spreadsheet", "title": "Q3", "metadata": { … },
//!   "columns": ["A", "B"], "rows": [["1", "2"]] }
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ArtifactError, Result, ValidationFailure};
use crate::plugins::{
    ask::AskContent, chat::ChatContent, code::CodeContent, diagram::DiagramContent,
    document::DocumentContent, form::FormContent, image::ImageContent, layout::LayoutContent,
    macros::MacroContent, remote_call::RemoteCallContent, search::SearchContent,
    spreadsheet::SpreadsheetContent, think::ThinkContent, voice::VoiceContent,
};

/// Opaque artifact identity, assigned once at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ArtifactError::invalid_payload(format!("invalid artifact id '{}': {}", s, e)))
    }
}

impl From<Uuid> for ArtifactId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The closed set of artifact type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Document,
    Spreadsheet,
    Diagram,
    Form,
    Search,
    Layout,
    Image,
    Voice,
    Macro,
    Code,
    RemoteCall,
    Chat,
    /// Conversational: a question and its answer
    Ask,
    /// Conversational: visible reasoning over a prompt
    Think,
}

impl ArtifactType {
    /// Every tag, in bootstrap order
    pub const ALL: [ArtifactType; 14] = [
        Self::Document,
        Self::Spreadsheet,
        Self::Diagram,
        Self::Form,
        Self::Search,
        Self::Layout,
        Self::Image,
        Self::Voice,
        Self::Macro,
        Self::Code,
        Self::RemoteCall,
        Self::Chat,
        Self::Ask,
        Self::Think,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Spreadsheet => "spreadsheet",
            Self::Diagram => "diagram",
            Self::Form => "form",
            Self::Search => "search",
            Self::Layout => "layout",
            Self::Image => "image",
            Self::Voice => "voice",
            Self::Macro => "macro",
            Self::Code => "code",
            Self::RemoteCall => "remote_call",
            Self::Chat => "chat",
            Self::Ask => "ask",
            Self::Think => "think",
        }
    }

    /// Parse a tag, accepting the kebab-case and `api` aliases
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized = tag.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "api" => Some(Self::RemoteCall),
            other => Self::ALL.into_iter().find(|t| t.as_str() == other),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::Image | Self::Voice => Capabilities {
                exportable: true,
                generated: true,
                conversational: false,
                transformable: false,
            },
            Self::Ask | Self::Think => Capabilities {
                exportable: true,
                generated: true,
                conversational: true,
                transformable: true,
            },
            Self::Chat => Capabilities {
                exportable: true,
                generated: false,
                conversational: true,
                transformable: true,
            },
            _ => Capabilities {
                exportable: true,
                generated: false,
                conversational: false,
                transformable: true,
            },
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = ArtifactError;

    /// An unknown tag has no constructor by definition
    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s).ok_or_else(|| ArtifactError::ConstructorNotFound { tag: s.to_string() })
    }
}

/// Capability flags derived from the type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Renders to JSON at least; see the plugin for richer formats
    pub exportable: bool,

    /// Content may be synthesized by the generation service during creation
    pub generated: bool,

    /// Part of a conversation rather than a standalone document
    pub conversational: bool,

    /// May act as the source or target of a transform
    pub transformable: bool,
}

fn default_revision() -> u32 {
    1
}

/// Bookkeeping shared by every artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Refreshed on every mutation
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,

    /// Starts at 1, incremented by each update
    #[serde(default = "default_revision")]
    pub revision: u32,

    /// Plugin that governed the last mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<String>,

    /// Prompt the artifact was generated from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_prompt: Option<String>,
}

impl Default for ArtifactMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_updated: now,
            revision: default_revision(),
            plugin_id: None,
            source_prompt: None,
        }
    }
}

/// Contract for the variant-specific part of an artifact
pub trait ContentModel: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Tag this content belongs to
    const TYPE: ArtifactType;

    /// Structural invariants of the variant
    fn validate(&self) -> std::result::Result<(), ValidationFailure>;

    /// Wrap into the sum type
    fn into_content(self) -> ArtifactContent;
}

/// Variant-specific fields, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactContent {
    Document(DocumentContent),
    Spreadsheet(SpreadsheetContent),
    Diagram(DiagramContent),
    Form(FormContent),
    Search(SearchContent),
    Layout(LayoutContent),
    Image(ImageContent),
    Voice(VoiceContent),
    Macro(MacroContent),
    Code(CodeContent),
    RemoteCall(RemoteCallContent),
    Chat(ChatContent),
    Ask(AskContent),
    Think(ThinkContent),
}

impl ArtifactContent {
    /// Fresh, empty content for a tag
    pub fn empty(artifact_type: ArtifactType) -> Self {
        match artifact_type {
            ArtifactType::Document => Self::Document(Default::default()),
            ArtifactType::Spreadsheet => Self::Spreadsheet(Default::default()),
            ArtifactType::Diagram => Self::Diagram(Default::default()),
            ArtifactType::Form => Self::Form(Default::default()),
            ArtifactType::Search => Self::Search(Default::default()),
            ArtifactType::Layout => Self::Layout(Default::default()),
            ArtifactType::Image => Self::Image(Default::default()),
            ArtifactType::Voice => Self::Voice(Default::default()),
            ArtifactType::Macro => Self::Macro(Default::default()),
            ArtifactType::Code => Self::Code(Default::default()),
            ArtifactType::RemoteCall => Self::RemoteCall(Default::default()),
            ArtifactType::Chat => Self::Chat(Default::default()),
            ArtifactType::Ask => Self::Ask(Default::default()),
            ArtifactType::Think => Self::Think(Default::default()),
        }
    }

    pub fn artifact_type(&self) -> ArtifactType {
        match self {
            Self::Document(_) => ArtifactType::Document,
            Self::Spreadsheet(_) => ArtifactType::Spreadsheet,
            Self::Diagram(_) => ArtifactType::Diagram,
            Self::Form(_) => ArtifactType::Form,
            Self::Search(_) => ArtifactType::Search,
            Self::Layout(_) => ArtifactType::Layout,
            Self::Image(_) => ArtifactType::Image,
            Self::Voice(_) => ArtifactType::Voice,
            Self::Macro(_) => ArtifactType::Macro,
            Self::Code(_) => ArtifactType::Code,
            Self::RemoteCall(_) => ArtifactType::RemoteCall,
            Self::Chat(_) => ArtifactType::Chat,
            Self::Ask(_) => ArtifactType::Ask,
            Self::Think(_) => ArtifactType::Think,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        match self {
            Self::Document(c) => c.validate(),
            Self::Spreadsheet(c) => c.validate(),
            Self::Diagram(c) => c.validate(),
            Self::Form(c) => c.validate(),
            Self::Search(c) => c.validate(),
            Self::Layout(c) => c.validate(),
            Self::Image(c) => c.validate(),
            Self::Voice(c) => c.validate(),
            Self::Macro(c) => c.validate(),
            Self::Code(c) => c.validate(),
            Self::RemoteCall(c) => c.validate(),
            Self::Chat(c) => c.validate(),
            Self::Ask(c) => c.validate(),
            Self::Think(c) => c.validate(),
        }
    }
}

/// One artifact instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub metadata: ArtifactMetadata,

    #[serde(flatten)]
    pub content: ArtifactContent,
}

impl Artifact {
    /// Create an artifact around existing content with a fresh identity
    pub fn new(content: ArtifactContent) -> Self {
        Self {
            id: ArtifactId::new(),
            title: None,
            description: None,
            metadata: ArtifactMetadata::default(),
            content,
        }
    }

    /// Fresh, empty instance of a tag
    pub fn empty(artifact_type: ArtifactType) -> Self {
        Self::new(ArtifactContent::empty(artifact_type))
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn artifact_type(&self) -> ArtifactType {
        self.content.artifact_type()
    }

    /// Run the variant's structural validation
    pub fn validate(&self) -> Result<()> {
        self.content
            .validate()
            .map_err(|failure| ArtifactError::validation(self.artifact_type(), failure))
    }

    /// Refresh `last_updated`
    pub fn touch(&mut self) {
        self.metadata.last_updated = Utc::now();
    }

    /// Flat JSON payload form
    pub fn to_payload(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Title for display, falling back to the tag
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("Untitled {}", self.artifact_type()))
    }
}

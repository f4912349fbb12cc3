//! Generation service interfaces.
//!
//! Artifact content that must be synthesized (images, voice, answers,
//! conversions) comes from an external generation service. The framework
//! treats it as an opaque async collaborator behind [`GenerationService`].

pub mod command;
pub mod mock;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::ArtifactType;

pub use command::CommandGenerator;
pub use mock::StaticGenerator;

/// Default time allowed for one completion
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A request for generated content
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Artifact type the content is for
    pub artifact_type: ArtifactType,

    /// Instruction for the service
    pub prompt: String,

    /// Supporting material (e.g. a source artifact as JSON)
    pub context: Option<String>,
}

impl GenerationRequest {
    pub fn new(artifact_type: ArtifactType, prompt: impl Into<String>) -> Self {
        Self {
            artifact_type,
            prompt: prompt.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Prompt and context as one text block
    pub fn render(&self) -> String {
        match &self.context {
            Some(context) => format!("{}\n\n---\n{}", self.prompt, context),
            None => self.prompt.clone(),
        }
    }
}

/// Output from a generation service
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// The content returned by the service
    pub content: String,

    /// Tokens used (if available)
    pub tokens_used: Option<u64>,

    /// Cost in USD (if available)
    pub cost_usd: Option<f64>,
}

impl GenerationOutput {
    /// Create a new output with just content
    pub fn new(content: String) -> Self {
        Self {
            content,
            tokens_used: None,
            cost_usd: None,
        }
    }
}

/// Trait for generation backends
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Human-readable service name
    fn name(&self) -> &str;

    /// Produce content for a request
    async fn complete(&self, request: &GenerationRequest) -> Result<GenerationOutput>;

    /// Check the backend is reachable
    async fn health_check(&self) -> Result<()>;
}

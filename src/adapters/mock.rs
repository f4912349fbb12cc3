//! Deterministic generation service.
//!
//! Used offline and in tests: answers from a fixed response table, falling
//! back to echoing the prompt, and remembers every request it served.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::domain::ArtifactType;

use super::{GenerationOutput, GenerationRequest, GenerationService};

#[derive(Default)]
pub struct StaticGenerator {
    responses: HashMap<ArtifactType, String>,
    failure: Option<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl StaticGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer requests for `artifact_type` with `content`
    pub fn with_response(mut self, artifact_type: ArtifactType, content: impl Into<String>) -> Self {
        self.responses.insert(artifact_type, content.into());
        self
    }

    /// Fail every request with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Requests served so far, oldest first
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GenerationService for StaticGenerator {
    fn name(&self) -> &str {
        "static"
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        info!(artifact_type = %request.artifact_type, "Static generator processing request");

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(message) = &self.failure {
            anyhow::bail!("{}", message);
        }

        let content = self
            .responses
            .get(&request.artifact_type)
            .cloned()
            .unwrap_or_else(|| format!("Generated {} for: {}", request.artifact_type, request.prompt));

        let tokens = (request.render().len() + content.len()) as u64 / 4;
        Ok(GenerationOutput {
            content,
            tokens_used: Some(tokens),
            cost_usd: None,
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

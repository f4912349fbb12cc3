//! Generation service backed by an external command.
//!
//! The configured program is spawned once per request with the rendered
//! prompt on stdin; whatever it prints to stdout is the generated content.
//! The artifact type is passed in `ARTIFEX_ARTIFACT_TYPE` so one script can
//! serve every type.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::{GenerationOutput, GenerationRequest, GenerationService, DEFAULT_TIMEOUT};

/// Generation service using subprocess mode
pub struct CommandGenerator {
    /// Program to spawn
    program: String,

    /// Arguments passed before the prompt is piped in
    args: Vec<String>,

    /// Time allowed per request
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Spawn the program, pipe the prompt to stdin, collect stdout
    async fn execute_subprocess(&self, request: &GenerationRequest) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("ARTIFEX_ARTIFACT_TYPE", request.artifact_type.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn generator '{}'", self.program))?;

        // Feed stdin while stdout is drained; a generator that echoes as it
        // reads would otherwise fill its pipe and stall the write
        let prompt = request.render().into_bytes();
        let writer = child.stdin.take().map(|mut stdin| {
            // Dropping stdin when the task ends signals EOF
            tokio::spawn(async move { stdin.write_all(&prompt).await })
        });

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(waited) => waited.with_context(|| format!("Failed to wait for generator '{}'", self.program))?,
            Err(_) => {
                if let Some(writer) = &writer {
                    writer.abort();
                }
                anyhow::bail!(
                    "Generator '{}' timed out after {:?}",
                    self.program,
                    self.timeout
                );
            }
        };

        if let Some(writer) = writer {
            match writer.await.context("Prompt writer task failed")? {
                Ok(()) => {}
                // The generator may exit without reading all of its input
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e).context("Failed to write prompt to generator stdin"),
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "Generator '{}' failed with exit code {}: {}",
                self.program,
                exit_code,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("Generator output is not valid UTF-8")
    }
}

#[async_trait]
impl GenerationService for CommandGenerator {
    fn name(&self) -> &str {
        &self.program
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        let content = self.execute_subprocess(request).await?;
        Ok(GenerationOutput::new(content.trim_end().to_string()))
    }

    async fn health_check(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("Failed to run generator '{}'", self.program))?;

        if !status.success() {
            anyhow::bail!("Generator '{}' health check failed: {}", self.program, status);
        }
        Ok(())
    }
}

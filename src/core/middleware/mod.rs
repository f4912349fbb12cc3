//! Middleware pipeline around the create/update/transform lifecycle.
//!
//! A pipeline is an ordered list of middlewares wrapped around one inner
//! operation. Each middleware receives the shared [`MiddlewareContext`] and a
//! [`Next`] continuation; calling `next.run(ctx)` runs the rest of the chain
//! and then the inner operation. Not calling it short-circuits the run.
//!
//! ```text
//! Logging → Metadata → Validation → Hooks → [inner operation]
//!                                                  ↓
//! Logging ← Metadata ← Validation ← Hooks ←────────┘
//! ```
//!
//! "Before" logic therefore runs in registration order and "after" logic in
//! reverse.

pub mod hooks;
pub mod logging;
pub mod metadata;
pub mod validation;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Artifact, ArtifactType};
use crate::error::Result;

use super::plugin::ArtifactPlugin;
use super::plugin_manager::PluginManager;

pub use hooks::HookMiddleware;
pub use logging::LoggingMiddleware;
pub use metadata::MetadataMiddleware;
pub use validation::ValidationMiddleware;

/// Lifecycle operation a pipeline run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Transform,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Transform => write!(f, "transform"),
        }
    }
}

/// State shared by the middlewares of one pipeline run.
///
/// Owned by the run and dropped when it ends.
pub struct MiddlewareContext {
    pub operation: Operation,

    /// Type of the payload entering the pipeline (the source, for transforms)
    pub artifact_type: ArtifactType,

    pub payload: Value,

    /// Plugin governing `artifact_type`
    pub plugin: Arc<dyn ArtifactPlugin>,

    /// Set only during a transform
    pub target_type: Option<ArtifactType>,

    pub target_plugin: Option<Arc<dyn ArtifactPlugin>>,

    /// Instance built by the inner operation, if any
    pub artifact: Option<Artifact>,
}

impl MiddlewareContext {
    pub fn new(
        operation: Operation,
        artifact_type: ArtifactType,
        payload: Value,
        plugin: Arc<dyn ArtifactPlugin>,
    ) -> Self {
        Self {
            operation,
            artifact_type,
            payload,
            plugin,
            target_type: None,
            target_plugin: None,
            artifact: None,
        }
    }

    pub fn transform(
        source_type: ArtifactType,
        payload: Value,
        source_plugin: Arc<dyn ArtifactPlugin>,
        target_type: ArtifactType,
        target_plugin: Arc<dyn ArtifactPlugin>,
    ) -> Self {
        Self {
            target_type: Some(target_type),
            target_plugin: Some(target_plugin),
            ..Self::new(Operation::Transform, source_type, payload, source_plugin)
        }
    }

    /// Plugin that owns the payload once the run completes
    pub fn result_plugin(&self) -> &Arc<dyn ArtifactPlugin> {
        self.target_plugin.as_ref().unwrap_or(&self.plugin)
    }
}

/// One step of cross-cutting logic
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    /// Do "before" work, usually call `next.run(ctx)`, then do "after" work
    async fn handle(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> Result<()>;
}

/// The work a pipeline wraps
#[async_trait]
pub trait InnerOperation: Send + Sync {
    async fn run(&self, ctx: &mut MiddlewareContext) -> Result<()>;
}

/// Inner operation that does nothing
pub struct Passthrough;

#[async_trait]
impl InnerOperation for Passthrough {
    async fn run(&self, _ctx: &mut MiddlewareContext) -> Result<()> {
        Ok(())
    }
}

/// Continuation over the rest of the chain
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    inner: &'a dyn InnerOperation,
}

impl<'a> Next<'a> {
    /// Run the remaining middlewares, then the inner operation
    pub async fn run(self, ctx: &mut MiddlewareContext) -> Result<()> {
        match self.chain.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    chain: rest,
                    inner: self.inner,
                };
                current.handle(ctx, next).await
            }
            None => self.inner.run(ctx).await,
        }
    }
}

/// Ordered middleware chain
#[derive(Clone, Default)]
pub struct Pipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logging, metadata stamping, validation, then plugin hooks
    pub fn default_stack(plugins: Arc<PluginManager>) -> Self {
        Self::new()
            .with(LoggingMiddleware)
            .with(MetadataMiddleware)
            .with(ValidationMiddleware::new(plugins))
            .with(HookMiddleware)
    }

    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.push(Arc::new(middleware));
        self
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run the chain around `inner`
    pub async fn execute(&self, ctx: &mut MiddlewareContext, inner: &dyn InnerOperation) -> Result<()> {
        Next {
            chain: &self.middlewares,
            inner,
        }
        .run(ctx)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArtifactError;
    use crate::plugins::document::DocumentPlugin;
    use serde_json::json;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recording {
        label: &'static str,
        log: Log,
    }

    #[async_trait]
    impl Middleware for Recording {
        fn name(&self) -> &'static str {
            self.label
        }

        async fn handle(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> Result<()> {
            self.log.lock().unwrap().push(format!("{}:before", self.label));
            next.run(ctx).await?;
            self.log.lock().unwrap().push(format!("{}:after", self.label));
            Ok(())
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        fn name(&self) -> &'static str {
            "short-circuit"
        }

        async fn handle(&self, _ctx: &mut MiddlewareContext, _next: Next<'_>) -> Result<()> {
            Ok(())
        }
    }

    struct RecordInner(Log);

    #[async_trait]
    impl InnerOperation for RecordInner {
        async fn run(&self, ctx: &mut MiddlewareContext) -> Result<()> {
            self.0.lock().unwrap().push("inner".to_string());
            ctx.payload["touched"] = json!(true);
            Ok(())
        }
    }

    struct FailingInner;

    #[async_trait]
    impl InnerOperation for FailingInner {
        async fn run(&self, _ctx: &mut MiddlewareContext) -> Result<()> {
            Err(ArtifactError::invalid_payload("inner failure"))
        }
    }

    fn context() -> MiddlewareContext {
        MiddlewareContext::new(
            Operation::Create,
            ArtifactType::Document,
            json!({ "type": "document", "content": "hello" }),
            Arc::new(DocumentPlugin::new()),
        )
    }

    fn recording_pipeline(log: &Log) -> Pipeline {
        ["A", "B", "C"].into_iter().fold(Pipeline::new(), |pipeline, label| {
            pipeline.with(Recording {
                label,
                log: Arc::clone(log),
            })
        })
    }

    #[tokio::test]
    async fn test_onion_ordering() {
        let log: Log = Arc::default();
        let pipeline = recording_pipeline(&log);
        let mut ctx = context();

        pipeline
            .execute(&mut ctx, &RecordInner(Arc::clone(&log)))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["A:before", "B:before", "C:before", "inner", "C:after", "B:after", "A:after"]
        );
        assert_eq!(ctx.payload["touched"], true);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_downstream() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new()
            .with(Recording {
                label: "A",
                log: Arc::clone(&log),
            })
            .with(ShortCircuit)
            .with(Recording {
                label: "C",
                log: Arc::clone(&log),
            });
        let mut ctx = context();

        pipeline
            .execute(&mut ctx, &RecordInner(Arc::clone(&log)))
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["A:before", "A:after"]);
    }

    #[tokio::test]
    async fn test_failure_skips_after_logic() {
        let log: Log = Arc::default();
        let pipeline = recording_pipeline(&log);
        let mut ctx = context();

        let err = pipeline.execute(&mut ctx, &FailingInner).await.unwrap_err();

        assert!(matches!(err, ArtifactError::InvalidPayload { .. }));
        assert_eq!(*log.lock().unwrap(), vec!["A:before", "B:before", "C:before"]);
    }

    #[tokio::test]
    async fn test_empty_pipeline_runs_inner() {
        let log: Log = Arc::default();
        let mut ctx = context();
        Pipeline::new()
            .execute(&mut ctx, &RecordInner(Arc::clone(&log)))
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["inner"]);
    }

    #[test]
    fn test_default_stack_order() {
        let pipeline = Pipeline::default_stack(Arc::new(PluginManager::new()));
        assert_eq!(pipeline.names(), vec!["logging", "metadata", "validation", "hooks"]);
    }
}

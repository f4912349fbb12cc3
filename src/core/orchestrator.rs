//! Lifecycle orchestrator.
//!
//! Coordinates create, update, transform and delete: each runs the middleware
//! pipeline around its inner operation, persists the result through the
//! collection store, records a journal event, and tells the reference holder
//! about updates and deletes.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Artifact, ArtifactId, ArtifactType, LifecycleEvent, LifecycleEventType};
use crate::error::{ArtifactError, Result};
use crate::references::{NoopReferences, ReferenceHolder};
use crate::store::{Collection, CollectionStore};

use super::journal::Journal;
use super::middleware::{InnerOperation, MiddlewareContext, Operation, Pipeline};
use super::payload::{as_object_mut, merge_into, payload_id, payload_type};
use super::plugin::{unsupported_export, BatchConfig, ExportFormat};
use super::plugin_manager::PluginManager;
use super::transform::ContentConverter;

/// Builds the artifact from the payload as it stands inside the pipeline.
///
/// The payload is replaced by the constructed artifact's, so after-hooks see
/// its id and bookkeeping and the stored artifact keeps them.
struct Construct<'a> {
    plugins: &'a PluginManager,
}

#[async_trait]
impl<'a> InnerOperation for Construct<'a> {
    async fn run(&self, ctx: &mut MiddlewareContext) -> Result<()> {
        let artifact = self.plugins.factory().create_from_payload(&ctx.payload)?;
        ctx.payload = artifact.to_payload()?;
        ctx.artifact = Some(artifact);
        Ok(())
    }
}

/// Replaces the source payload with the converter's target-shaped payload
struct Convert<'a> {
    converter: &'a dyn ContentConverter,
    target: ArtifactType,
}

#[async_trait]
impl<'a> InnerOperation for Convert<'a> {
    async fn run(&self, ctx: &mut MiddlewareContext) -> Result<()> {
        let mut converted = self.converter.convert(&ctx.payload, self.target).await?;
        let source_title = ctx.payload.get("title").cloned();

        let object = as_object_mut(&mut converted)?;
        object.insert("type".to_string(), Value::String(self.target.as_str().to_string()));
        // The result is a new artifact
        object.remove("id");
        object.remove("metadata");
        if let Some(title) = source_title {
            object.entry("title").or_insert(title);
        }

        ctx.payload = converted;
        Ok(())
    }
}

fn has_id(item: &Value, id: &str) -> bool {
    item.get("id").and_then(Value::as_str) == Some(id)
}

/// Main lifecycle orchestrator
pub struct Orchestrator {
    plugins: Arc<PluginManager>,
    pipeline: Pipeline,
    store: Arc<dyn CollectionStore>,
    references: Arc<dyn ReferenceHolder>,
    journal: Option<Journal>,

    /// Batch limits for plugins that declare none
    batch_defaults: BatchConfig,

    /// Serializes read-modify-write cycles on the artifact collection
    write_lock: Mutex<()>,
}

impl Orchestrator {
    /// Orchestrator with the default middleware stack and no reference holder
    pub fn new(plugins: Arc<PluginManager>, store: Arc<dyn CollectionStore>) -> Self {
        Self {
            pipeline: Pipeline::default_stack(Arc::clone(&plugins)),
            plugins,
            store,
            references: Arc::new(NoopReferences),
            journal: None,
            batch_defaults: BatchConfig::default(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_references(mut self, references: Arc<dyn ReferenceHolder>) -> Self {
        self.references = references;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_batch_defaults(mut self, batch_defaults: BatchConfig) -> Self {
        self.batch_defaults = batch_defaults;
        self
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    /// Create a new artifact of type `tag` from `payload`.
    ///
    /// Any `id` or `metadata` in the payload is discarded; the artifact gets a
    /// fresh identity and bookkeeping.
    #[instrument(skip(self, payload))]
    pub async fn create(&self, tag: &str, mut payload: Value) -> Result<Artifact> {
        let started = Instant::now();
        let artifact_type: ArtifactType = tag.parse()?;
        let plugin = self.plugins.require_plugin(artifact_type)?;

        if payload.get("type").is_some() {
            let declared = payload_type(&payload)?;
            if declared != artifact_type {
                return Err(ArtifactError::invalid_payload(format!(
                    "payload declares type '{}' but '{}' was requested",
                    declared, artifact_type
                )));
            }
        }

        let object = as_object_mut(&mut payload)?;
        object.insert("type".to_string(), Value::String(artifact_type.as_str().to_string()));
        object.remove("id");
        object.remove("metadata");

        let original = payload.clone();
        let mut ctx = MiddlewareContext::new(Operation::Create, artifact_type, payload, plugin);
        let outcome: Result<Artifact> = async {
            self.pipeline
                .execute(&mut ctx, &Construct { plugins: &self.plugins })
                .await?;

            // After-hooks may have changed the payload since construction
            let artifact = self.plugins.factory().create_from_payload(&ctx.payload)?;
            self.insert(&artifact).await?;
            Ok(artifact)
        }
        .await;
        let artifact = match outcome {
            Ok(artifact) => artifact,
            Err(err) => {
                Self::discard(&ctx, &original).await;
                return Err(err);
            }
        };

        info!(artifact_id = %artifact.id, %artifact_type, "Artifact created");
        self.record(
            LifecycleEvent::new(
                artifact.id,
                artifact_type,
                LifecycleEventType::Created,
                format!("Created {}", artifact.display_title()),
            )
            .with_duration(started.elapsed().as_millis() as u64),
        )
        .await;

        Ok(artifact)
    }

    /// Update a stored artifact with the fields of `payload`.
    ///
    /// The payload must carry the artifact's `id`. Its fields are merged over
    /// the stored artifact; identity, `created_at` and type are preserved and
    /// the revision is incremented. The plugin's `before_update` sees the
    /// merged payload first, and `after_replace` runs once the new revision
    /// is stored.
    #[instrument(skip(self, payload))]
    pub async fn update(&self, payload: Value) -> Result<Artifact> {
        let started = Instant::now();
        let id = payload_id(&payload)?
            .ok_or_else(|| ArtifactError::invalid_payload("update payload has no 'id'"))?;

        let existing = self.get(id).await?;
        let artifact_type = existing.artifact_type();

        if payload.get("type").is_some() && payload_type(&payload)? != artifact_type {
            return Err(ArtifactError::invalid_payload(format!(
                "artifact {} is a {}; use a transform to change its type",
                id, artifact_type
            )));
        }

        let mut merged = existing.to_payload()?;
        merge_into(&mut merged, &payload);

        let plugin = self.plugins.require_plugin(artifact_type)?;
        let merged = plugin.before_update(&existing, &payload, merged).await?;

        let original = merged.clone();
        let mut ctx = MiddlewareContext::new(Operation::Update, artifact_type, merged, plugin);
        let outcome: Result<Artifact> = async {
            self.pipeline
                .execute(&mut ctx, &Construct { plugins: &self.plugins })
                .await?;

            let mut artifact = self.plugins.factory().create_from_payload(&ctx.payload)?;
            artifact.id = id;
            artifact.metadata.created_at = existing.metadata.created_at;
            artifact.metadata.revision = existing.metadata.revision + 1;
            if artifact.metadata.last_updated < existing.metadata.last_updated {
                artifact.touch();
            }

            self.replace(&artifact).await?;
            Ok(artifact)
        }
        .await;
        let artifact = match outcome {
            Ok(artifact) => artifact,
            Err(err) => {
                Self::discard(&ctx, &original).await;
                return Err(err);
            }
        };

        if let Err(e) = ctx.plugin.after_replace(&existing, &artifact).await {
            warn!(artifact_id = %id, error = %e, "Failed to release replaced revision");
        }
        self.references.notify_artifact_updated(&artifact).await;

        info!(artifact_id = %id, revision = artifact.metadata.revision, "Artifact updated");
        self.record(
            LifecycleEvent::new(
                id,
                artifact_type,
                LifecycleEventType::Updated,
                format!("Updated {} to revision {}", artifact.display_title(), artifact.metadata.revision),
            )
            .with_duration(started.elapsed().as_millis() as u64),
        )
        .await;

        Ok(artifact)
    }

    /// Produce a new artifact of type `target_tag` from `source_payload`.
    ///
    /// The source plugin's `before_transform` prepares the payload, the
    /// converter reshapes it, the target plugin's `after_transform` finishes
    /// it, and the result must pass the target type's rules. The source is
    /// left untouched.
    #[instrument(skip(self, source_payload, converter))]
    pub async fn transform(
        &self,
        source_payload: Value,
        target_tag: &str,
        converter: &dyn ContentConverter,
    ) -> Result<Artifact> {
        let started = Instant::now();
        let source_type = payload_type(&source_payload)?;
        let target_type: ArtifactType = target_tag.parse()?;
        let source_id = payload_id(&source_payload)?;

        for artifact_type in [source_type, target_type] {
            if !artifact_type.capabilities().transformable {
                return Err(ArtifactError::invalid_payload(format!(
                    "{} artifacts cannot be transformed",
                    artifact_type
                )));
            }
        }

        let source_plugin = self.plugins.require_plugin(source_type)?;
        let target_plugin = self.plugins.require_plugin(target_type)?;

        let mut ctx = MiddlewareContext::transform(
            source_type,
            source_payload,
            source_plugin,
            target_type,
            target_plugin,
        );
        let convert = Convert {
            converter,
            target: target_type,
        };
        self.pipeline.execute(&mut ctx, &convert).await?;

        self.plugins.validation().validate(target_type, &ctx.payload).await?;
        let artifact = self.plugins.factory().create_from_payload(&ctx.payload)?;
        self.insert(&artifact).await?;

        info!(artifact_id = %artifact.id, %source_type, %target_type, "Artifact transformed");
        let mut event = LifecycleEvent::new(
            artifact.id,
            target_type,
            LifecycleEventType::Transformed,
            format!("Transformed {} into {}", source_type, target_type),
        )
        .with_duration(started.elapsed().as_millis() as u64);
        if let Some(source_id) = source_id {
            event = event.with_source(source_id);
        }
        self.record(event).await;

        Ok(artifact)
    }

    /// Transform a stored artifact
    pub async fn transform_artifact(
        &self,
        id: ArtifactId,
        target_tag: &str,
        converter: &dyn ContentConverter,
    ) -> Result<Artifact> {
        let source = self.get(id).await?;
        self.transform(source.to_payload()?, target_tag, converter).await
    }

    /// Delete an artifact, releasing what its plugin owns outside the store.
    ///
    /// The removal is persisted before the plugin's cleanup runs; a failed
    /// cleanup is logged and does not undo the delete.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ArtifactId) -> Result<Artifact> {
        let started = Instant::now();
        let key = id.to_string();

        let artifact = {
            let _guard = self.write_lock.lock().await;
            let mut items = self.load_artifacts().await?;
            let position = items
                .iter()
                .position(|item| has_id(item, &key))
                .ok_or(ArtifactError::NotFound { id })?;

            let artifact: Artifact = serde_json::from_value(items.remove(position))?;
            self.save_artifacts(&items).await?;
            artifact
        };

        match self.plugins.plugin_for_type(artifact.artifact_type()) {
            Some(plugin) => {
                if let Err(e) = plugin.cleanup(&artifact).await {
                    warn!(artifact_id = %id, error = %e, "Artifact deleted but cleanup failed");
                }
            }
            None => warn!(artifact_id = %id, "No plugin to clean up after artifact"),
        }

        self.references.notify_artifact_deleted(id).await;

        info!(artifact_id = %id, "Artifact deleted");
        self.record(
            LifecycleEvent::new(
                id,
                artifact.artifact_type(),
                LifecycleEventType::Deleted,
                format!("Deleted {}", artifact.display_title()),
            )
            .with_duration(started.elapsed().as_millis() as u64),
        )
        .await;

        Ok(artifact)
    }

    pub async fn get(&self, id: ArtifactId) -> Result<Artifact> {
        let key = id.to_string();
        let item = self
            .load_artifacts()
            .await?
            .into_iter()
            .find(|item| has_id(item, &key))
            .ok_or(ArtifactError::NotFound { id })?;
        Ok(serde_json::from_value(item)?)
    }

    /// Every stored artifact, in storage order. Unreadable entries are skipped.
    pub async fn list(&self) -> Result<Vec<Artifact>> {
        let items = self.load_artifacts().await?;
        let mut artifacts = Vec::with_capacity(items.len());

        for item in items {
            match serde_json::from_value::<Artifact>(item) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => warn!(error = %e, "Skipping unreadable artifact"),
            }
        }
        Ok(artifacts)
    }

    pub async fn list_by_type(&self, artifact_type: ArtifactType) -> Result<Vec<Artifact>> {
        let mut artifacts = self.list().await?;
        artifacts.retain(|a| a.artifact_type() == artifact_type);
        Ok(artifacts)
    }

    /// Render a stored artifact. JSON works for every type; other formats
    /// need the type's plugin to support them.
    pub async fn export(&self, id: ArtifactId, format: ExportFormat) -> Result<String> {
        let artifact = self.get(id).await?;
        if format == ExportFormat::Json {
            return Ok(serde_json::to_string_pretty(&artifact)?);
        }

        let plugin = self.plugins.require_plugin(artifact.artifact_type())?;
        if !plugin.export_formats().contains(&format) {
            return Err(unsupported_export(&artifact, format));
        }
        plugin.export(&artifact, format)
    }

    /// Create several artifacts of one type.
    ///
    /// The batch as a whole is rejected if it exceeds the plugin's limit;
    /// otherwise each payload succeeds or fails on its own and results come
    /// back in input order.
    #[instrument(skip(self, payloads), fields(size = payloads.len()))]
    pub async fn create_batch(&self, tag: &str, payloads: Vec<Value>) -> Result<Vec<Result<Artifact>>> {
        let artifact_type: ArtifactType = tag.parse()?;
        let plugin = self.plugins.require_plugin(artifact_type)?;
        let config = plugin.batch_config().unwrap_or(self.batch_defaults);

        if payloads.len() > config.max_batch_size {
            return Err(ArtifactError::BatchTooLarge {
                artifact_type,
                size: payloads.len(),
                limit: config.max_batch_size,
            });
        }

        debug!(concurrency = config.concurrency, "Running batch");
        let results: Vec<Result<Artifact>> = stream::iter(payloads)
            .map(|payload| self.create(tag, payload))
            .buffered(config.concurrency.max(1))
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Batch finished with failures");
        }
        Ok(results)
    }

    /// Check an externally sourced payload against a type's rules
    pub async fn validate(&self, tag: &str, payload: &Value) -> Result<ArtifactType> {
        let artifact_type: ArtifactType = tag.parse()?;
        self.plugins.require_plugin(artifact_type)?;
        self.plugins.validation().validate(artifact_type, payload).await?;
        Ok(artifact_type)
    }

    async fn load_artifacts(&self) -> Result<Vec<Value>> {
        self.store
            .load_all(Collection::Artifacts)
            .await
            .map_err(ArtifactError::Persistence)
    }

    async fn save_artifacts(&self, items: &[Value]) -> Result<()> {
        self.store
            .save_all(Collection::Artifacts, items)
            .await
            .map_err(ArtifactError::Persistence)
    }

    async fn insert(&self, artifact: &Artifact) -> Result<()> {
        let payload = artifact.to_payload()?;
        let _guard = self.write_lock.lock().await;
        let mut items = self.load_artifacts().await?;
        items.push(payload);
        self.save_artifacts(&items).await
    }

    /// Replace the stored artifact with the same id
    async fn replace(&self, artifact: &Artifact) -> Result<()> {
        let payload = artifact.to_payload()?;
        let key = artifact.id.to_string();
        let _guard = self.write_lock.lock().await;

        let mut items = self.load_artifacts().await?;
        let slot = items
            .iter_mut()
            .find(|item| has_id(item, &key))
            .ok_or(ArtifactError::NotFound { id: artifact.id })?;
        *slot = payload;
        self.save_artifacts(&items).await
    }

    /// Let the plugin release what its hooks stored for a failed operation
    async fn discard(ctx: &MiddlewareContext, original: &Value) {
        if let Err(e) = ctx.plugin.discard(original, &ctx.payload).await {
            warn!(
                plugin = ctx.plugin.id(),
                operation = %ctx.operation,
                error = %e,
                "Failed to discard generated content"
            );
        }
    }

    /// Append to the journal; a journal failure never fails the operation
    async fn record(&self, event: LifecycleEvent) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&event).await {
                warn!(error = %e, event_type = %event.event_type, "Failed to write journal event");
            }
        }
    }
}

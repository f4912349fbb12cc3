use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::core::payload::set_metadata_field;
use crate::error::Result;

use super::{Middleware, MiddlewareContext, Next};

/// Stamps `metadata.last_updated` on the way in and again on the way out,
/// so the stored value marks when processing finished.
pub struct MetadataMiddleware;

impl MetadataMiddleware {
    fn stamp(ctx: &mut MiddlewareContext) -> Result<()> {
        let now = serde_json::to_value(Utc::now())?;
        set_metadata_field(&mut ctx.payload, "last_updated", now)
    }
}

#[async_trait]
impl Middleware for MetadataMiddleware {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn handle(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> Result<()> {
        Self::stamp(ctx)?;

        next.run(ctx).await?;

        Self::stamp(ctx)?;
        let plugin_id = Value::String(ctx.result_plugin().id().to_string());
        set_metadata_field(&mut ctx.payload, "plugin_id", plugin_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::middleware::{Operation, Passthrough, Pipeline};
    use crate::domain::ArtifactType;
    use crate::plugins::document::DocumentPlugin;
    use chrono::DateTime;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stamps_last_updated_and_plugin() {
        let before = Utc::now();
        let mut ctx = MiddlewareContext::new(
            Operation::Create,
            ArtifactType::Document,
            json!({ "type": "document", "content": "x" }),
            Arc::new(DocumentPlugin::new()),
        );

        Pipeline::new()
            .with(MetadataMiddleware)
            .execute(&mut ctx, &Passthrough)
            .await
            .unwrap();

        let stamped: DateTime<Utc> =
            serde_json::from_value(ctx.payload["metadata"]["last_updated"].clone()).unwrap();
        assert!(stamped >= before);
        assert_eq!(ctx.payload["metadata"]["plugin_id"], "document-plugin");
    }

    #[tokio::test]
    async fn test_keeps_existing_metadata_fields() {
        let mut ctx = MiddlewareContext::new(
            Operation::Update,
            ArtifactType::Document,
            json!({ "type": "document", "content": "x", "metadata": { "revision": 3 } }),
            Arc::new(DocumentPlugin::new()),
        );

        Pipeline::new()
            .with(MetadataMiddleware)
            .execute(&mut ctx, &Passthrough)
            .await
            .unwrap();

        assert_eq!(ctx.payload["metadata"]["revision"], 3);
        assert!(ctx.payload["metadata"]["last_updated"].is_string());
    }
}

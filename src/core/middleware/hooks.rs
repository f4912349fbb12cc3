use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ArtifactError, Result};

use super::{Middleware, MiddlewareContext, Next};

/// Invokes plugin lifecycle hooks around the inner operation.
///
/// Without a target type the owning plugin's create hooks run. During a
/// transform the source plugin's `before_transform` runs on the way in and the
/// target plugin's `after_transform` on the way out.
pub struct HookMiddleware;

#[async_trait]
impl Middleware for HookMiddleware {
    fn name(&self) -> &'static str {
        "hooks"
    }

    async fn handle(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> Result<()> {
        let Some(target_type) = ctx.target_type else {
            let plugin = Arc::clone(&ctx.plugin);

            debug!(plugin = plugin.id(), "before_create");
            ctx.payload = plugin.before_create(std::mem::take(&mut ctx.payload)).await?;

            next.run(ctx).await?;

            // A failing after-hook leaves the constructed payload in place
            debug!(plugin = plugin.id(), "after_create");
            ctx.payload = plugin.after_create(ctx.payload.clone()).await?;
            return Ok(());
        };

        let target_plugin = ctx.target_plugin.clone().ok_or_else(|| {
            ArtifactError::ConstructorNotFound {
                tag: target_type.to_string(),
            }
        })?;
        let source_plugin = Arc::clone(&ctx.plugin);
        let source_type = ctx.artifact_type;

        debug!(plugin = source_plugin.id(), %target_type, "before_transform");
        ctx.payload = source_plugin
            .before_transform(std::mem::take(&mut ctx.payload), target_type)
            .await?;

        next.run(ctx).await?;

        debug!(plugin = target_plugin.id(), %source_type, "after_transform");
        ctx.payload = target_plugin
            .after_transform(std::mem::take(&mut ctx.payload), source_type)
            .await?;
        Ok(())
    }
}

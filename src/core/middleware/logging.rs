use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::Result;

use super::{Middleware, MiddlewareContext, Next};

/// Records start, duration and failure of each run; failures pass through unchanged
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> Result<()> {
        let operation = ctx.operation;
        let artifact_type = ctx.artifact_type;
        let plugin_id = ctx.plugin.id().to_string();
        let target = ctx.target_type.map(|t| t.to_string());

        debug!(%operation, %artifact_type, plugin = %plugin_id, ?target, "Pipeline started");
        let started = Instant::now();

        let result = next.run(ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => info!(
                %operation,
                %artifact_type,
                plugin = %plugin_id,
                ?target,
                duration_ms,
                "Pipeline completed"
            ),
            Err(e) => error!(
                %operation,
                %artifact_type,
                plugin = %plugin_id,
                ?target,
                duration_ms,
                code = e.code(),
                error = %e,
                "Pipeline failed"
            ),
        }

        result
    }
}

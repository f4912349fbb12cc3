use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::plugin_manager::PluginManager;
use crate::error::Result;

use super::{Middleware, MiddlewareContext, Next};

/// Runs the validation registry over the payload before letting the chain proceed
pub struct ValidationMiddleware {
    plugins: Arc<PluginManager>,
}

impl ValidationMiddleware {
    pub fn new(plugins: Arc<PluginManager>) -> Self {
        Self { plugins }
    }
}

#[async_trait]
impl Middleware for ValidationMiddleware {
    fn name(&self) -> &'static str {
        "validation"
    }

    async fn handle(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> Result<()> {
        self.plugins
            .validation()
            .validate(ctx.artifact_type, &ctx.payload)
            .await?;
        debug!(artifact_type = %ctx.artifact_type, "Payload passed validation");

        next.run(ctx).await
    }
}

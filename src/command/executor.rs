//! Command executor - validates and dispatches incoming invocations

use super::handlers::{self, HandlerContext};
use crate::error::AgentError;
use camera_agent_shared::{Invocation, InvocationResult, Method, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Executes method invocations received from the hub
#[derive(Clone)]
pub struct CommandExecutor {
    ctx: Arc<HandlerContext>,
}

impl CommandExecutor {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    /// Execute an invocation and return its response. Never fails: handler
    /// errors become 500, unknown names 404, and a panicking handler is
    /// contained in its own task and reported as 500.
    pub async fn execute(&self, invocation: Invocation) -> Response {
        let start = Instant::now();
        info!("Executing method: {}", invocation.name);

        let Some(method) = Method::from_name(&invocation.name) else {
            warn!("  {}", AgentError::UnsupportedCommand(invocation.name.clone()));
            return Response::not_found(&invocation.name);
        };

        let ctx = self.ctx.clone();
        let payload = invocation.payload;
        let outcome =
            tokio::spawn(async move { handlers::handle(method, &ctx, &payload).await }).await;

        let response = match outcome {
            Ok(Ok(reply)) => {
                info!("  {} completed: {}", method, reply.message);
                Response::from_result(InvocationResult::success(reply.message, reply.data))
            }
            Ok(Err(e)) => {
                error!("  {} failed: {}", method, e);
                Response::from_result(InvocationResult::error(e.to_string()))
            }
            Err(e) => {
                error!("  {} handler aborted: {}", method, e);
                Response::internal_error(format!("Internal error: {}", e))
            }
        };

        info!(
            "  {} -> {} in {}ms",
            method,
            response.status_code,
            start.elapsed().as_millis()
        );
        response
    }
}

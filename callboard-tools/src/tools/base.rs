use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use async_trait::async_trait;

/// A callable the model may request by name.
///
/// Input is validated against the owning capability's schema before
/// `execute` is called.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(
        &self,
        ctx: ExecutionContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError>;
}

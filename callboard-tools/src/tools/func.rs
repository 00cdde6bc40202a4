use async_trait::async_trait;
use std::future::Future;
use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::tools::base::Tool;

/// Adapts an async closure into a [`Tool`].
pub struct FnTool<F> {
    name: String,
    func: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(ExecutionContext, serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, ToolError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(ExecutionContext, serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, ToolError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        ctx: ExecutionContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        (self.func)(ctx, input).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("s1".into(), "talent_scout".into(), "call_1".into())
    }

    #[tokio::test]
    async fn test_closure_tool_receives_input() {
        let tool = FnTool::new("count_roles", |_ctx: ExecutionContext, input: serde_json::Value| async move {
            let roles = input["roles"].as_array().map(|r| r.len()).unwrap_or(0);
            Ok::<_, ToolError>(json!({"count": roles}))
        });

        assert_eq!(tool.name(), "count_roles");
        let out = tool.execute(ctx(), json!({"roles": ["lead", "extra"]})).await.unwrap();
        assert_eq!(out["count"], 2);
    }

    #[tokio::test]
    async fn test_closure_tool_error_propagates() {
        let tool = FnTool::new("broken", |_ctx: ExecutionContext, _input: serde_json::Value| async move {
            Err::<serde_json::Value, _>(ToolError::ExecutionFailed("backend down".into()))
        });

        let err = tool.execute(ctx(), json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::ExecutionFailed("backend down".into()));
    }

    #[tokio::test]
    async fn test_closure_tool_sees_context() {
        let tool = FnTool::new("whoami", |ctx: ExecutionContext, _input: serde_json::Value| async move {
            Ok::<_, ToolError>(json!({"agent": ctx.agent_id, "call": ctx.call_id}))
        });

        let out = tool.execute(ctx(), json!({})).await.unwrap();
        assert_eq!(out["agent"], "talent_scout");
        assert_eq!(out["call"], "call_1");
    }
}

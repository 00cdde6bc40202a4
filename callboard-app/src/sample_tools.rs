//! Stand-in implementations for the sample agents' capabilities.
//!
//! Real deployments register their search, scheduling and script services
//! under the same names.

use callboard_tools::{EchoTool, ExecutionContext, ToolError, ToolRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn sample_tool_registry() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools
        .register(Arc::new(EchoTool))
        .register_fn("find_talent_matches", |_ctx: ExecutionContext, input: Value| async move {
            let role = input
                .get("role")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidInput("role is required".to_string()))?
                .to_string();
            Ok::<_, ToolError>(json!({
                "role": role,
                "candidates": [
                    {"name": "A. Rivera", "agency": "Northlight"},
                    {"name": "J. Okafor", "agency": "Independent"}
                ]
            }))
        })
        .register_fn("book_audition", |ctx: ExecutionContext, input: Value| async move {
            Ok::<_, ToolError>(json!({
                "booking_ref": ctx.call_id,
                "slot": input.get("slot").cloned().unwrap_or(json!("next available")),
                "status": "tentative"
            }))
        })
        .register_fn("parse_script", |_ctx: ExecutionContext, input: Value| async move {
            let text = input.get("text").and_then(Value::as_str).unwrap_or_default();
            let roles: Vec<&str> = text
                .lines()
                .filter_map(|line| line.trim().strip_suffix(':'))
                .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_uppercase() || c == ' '))
                .collect();
            let mut roles: Vec<String> = roles.into_iter().map(str::to_string).collect();
            roles.sort();
            roles.dedup();
            Ok::<_, ToolError>(json!({"roles": roles}))
        });
    tools
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("s1".into(), "talent_scout".into(), "c1".into())
    }

    #[test]
    fn test_sample_registry_contents() {
        let tools = sample_tool_registry();
        assert_eq!(
            tools.list(),
            vec!["book_audition", "echo", "find_talent_matches", "parse_script"]
        );
    }

    #[tokio::test]
    async fn test_parse_script_extracts_roles() {
        let tools = sample_tool_registry();
        let tool = tools.get("parse_script").unwrap();
        let output = tool
            .execute(ctx(), json!({"text": "HAMLET:\nTo be.\nOPHELIA:\nMy lord.\nHAMLET:\n"}))
            .await
            .unwrap();
        assert_eq!(output["roles"], json!(["HAMLET", "OPHELIA"]));
    }

    #[tokio::test]
    async fn test_find_talent_requires_role() {
        let tools = sample_tool_registry();
        let tool = tools.get("find_talent_matches").unwrap();
        assert!(tool.execute(ctx(), json!({})).await.is_err());
    }
}

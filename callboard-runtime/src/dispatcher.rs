//! Tool dispatch: validate, execute and wrap every requested call.

use crate::metrics::{self, MetricTimer};
use crate::registry::AgentDefinition;
use crate::session::Session;
use crate::types::{Message, Role, ToolCallRequest};
use callboard_tools::{validate_input, ExecutionContext, ToolError, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How one batch of tool calls is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    Parallel,
    Sequential,
}

/// Success payload or captured failure of one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(String),
    Failure { error: String, tool_name: String },
}

/// Uniform result envelope fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Success(payload.into()),
        }
    }

    pub fn failure(call_id: impl Into<String>, tool_name: impl Into<String>, error: &ToolError) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Failure {
                error: error.to_string(),
                tool_name: tool_name.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    /// Conversation entry carrying this result.
    pub fn to_message(&self, tool_name: &str) -> Message {
        let content = serde_json::to_value(self).unwrap_or_else(|_| json!({"call_id": self.call_id}));
        Message::with_metadata(
            Role::Tool,
            content,
            json!({"call_id": self.call_id, "tool_name": tool_name}),
        )
    }
}

fn payload_to_string(payload: Value) -> String {
    match payload {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Executes model-requested calls against the agent's capabilities.
///
/// Failures are never escalated; each one becomes that call's result.
pub struct ToolDispatcher {
    tools: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: None,
        }
    }

    /// Bound each call's wall-clock time. Off by default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run a batch and return one result per request, in request order.
    pub async fn execute(
        &self,
        requests: &[ToolCallRequest],
        agent: &AgentDefinition,
        session: &Session,
        mode: DispatchMode,
    ) -> Vec<ToolResult> {
        info!(
            "Dispatching {} tool call(s) for session {} in {:?} mode",
            requests.len(),
            session.id,
            mode
        );

        match mode {
            DispatchMode::Parallel => {
                let calls = requests
                    .iter()
                    .map(|request| self.execute_one(request, agent, session));
                futures::future::join_all(calls).await
            }
            DispatchMode::Sequential => {
                let mut results = Vec::with_capacity(requests.len());
                for request in requests {
                    results.push(self.execute_one(request, agent, session).await);
                }
                results
            }
        }
    }

    async fn execute_one(
        &self,
        request: &ToolCallRequest,
        agent: &AgentDefinition,
        session: &Session,
    ) -> ToolResult {
        let _timer = MetricTimer::new(metrics::TOOL_EXECUTION_LATENCY);

        match self.run(request, agent, session).await {
            Ok(payload) => {
                debug!("Tool {} (call {}) succeeded", request.name, request.id);
                ToolResult::success(request.id.clone(), payload_to_string(payload))
            }
            Err(e) => {
                warn!("Tool {} (call {}) failed: {}", request.name, request.id, e);
                ToolResult::failure(request.id.clone(), request.name.clone(), &e)
            }
        }
    }

    async fn run(
        &self,
        request: &ToolCallRequest,
        agent: &AgentDefinition,
        session: &Session,
    ) -> Result<Value, ToolError> {
        let capability = agent
            .capability(&request.name)
            .ok_or_else(|| ToolError::NotFound(request.name.clone()))?;

        validate_input(&capability.input_schema, &request.input)?;

        let tool = self
            .tools
            .get(capability.tool_name())
            .ok_or_else(|| ToolError::NotFound(capability.tool_name().to_string()))?;

        let ctx = ExecutionContext::new(
            session.id.clone(),
            agent.id.to_string(),
            request.id.clone(),
        );
        let input = request.input.clone();

        // Spawned so a panicking tool cannot take the batch down with it.
        let mut handle = tokio::spawn(async move { tool.execute(ctx, input).await });

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    return Err(ToolError::Timeout(limit.as_millis() as u64));
                }
            },
            None => handle.await,
        };

        let output = match joined {
            Ok(result) => result?,
            Err(join_err) if join_err.is_panic() => {
                error!("Tool {} panicked", request.name);
                return Err(ToolError::Panicked);
            }
            Err(join_err) => return Err(ToolError::ExecutionFailed(join_err.to_string())),
        };

        if let Err(e) = validate_input(&capability.output_schema, &output) {
            warn!(
                "Tool {} output does not match its declared schema: {}",
                request.name, e
            );
        }

        Ok(output)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::registry::{AgentId, Capability};
    use std::time::Instant;

    fn agent() -> AgentDefinition {
        AgentDefinition::new("talent_scout", "prompt")
            .with_capability(Capability::new("find_talent_matches", "").with_input_schema(json!({
                "type": "object",
                "properties": {"role": {"type": "string"}},
                "required": ["role"]
            })))
            .with_capability(Capability::new("slow_lookup", ""))
            .with_capability(Capability::new("explode", ""))
            .with_capability(Capability::new("fail", ""))
            .with_capability(Capability::new("unimplemented", ""))
    }

    fn tools() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn("find_talent_matches", |_ctx: ExecutionContext, input: Value| async move {
                Ok::<_, ToolError>(json!({"role": input["role"], "matches": 2}))
            })
            .register_fn("slow_lookup", |_ctx: ExecutionContext, _input: Value| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, ToolError>(json!("done"))
            })
            .register_fn("explode", |_ctx: ExecutionContext, _input: Value| async move {
                if true {
                    panic!("tool blew up");
                }
                Ok::<_, ToolError>(json!(null))
            })
            .register_fn("fail", |_ctx: ExecutionContext, _input: Value| async move {
                Err::<Value, _>(ToolError::ExecutionFailed("talent db offline".into()))
            });
        Arc::new(registry)
    }

    fn session() -> Session {
        Session::new("user", "open_call", AgentId::from("talent_scout"))
    }

    fn call(id: &str, name: &str, input: Value) -> ToolCallRequest {
        ToolCallRequest::new(id, name, input)
    }

    #[tokio::test]
    async fn test_success_payload_is_string() {
        let dispatcher = ToolDispatcher::new(tools());
        let results = dispatcher
            .execute(
                &[call("c1", "find_talent_matches", json!({"role": "lead"}))],
                &agent(),
                &session(),
                DispatchMode::Parallel,
            )
            .await;

        assert_eq!(results.len(), 1);
        match &results[0].outcome {
            ToolOutcome::Success(payload) => {
                let parsed: Value = serde_json::from_str(payload).unwrap();
                assert_eq!(parsed["matches"], 2);
            }
            other => panic!("Expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_capability_is_per_call_failure() {
        let dispatcher = ToolDispatcher::new(tools());
        let results = dispatcher
            .execute(
                &[
                    call("c1", "parse_script", json!({})),
                    call("c2", "slow_lookup", json!({})),
                ],
                &agent(),
                &session(),
                DispatchMode::Sequential,
            )
            .await;

        assert_eq!(
            results[0].outcome,
            ToolOutcome::Failure {
                error: "Tool not found: parse_script".into(),
                tool_name: "parse_script".into()
            }
        );
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn test_invalid_input_captured() {
        let dispatcher = ToolDispatcher::new(tools());
        let results = dispatcher
            .execute(
                &[call("c1", "find_talent_matches", json!({"role": 5}))],
                &agent(),
                &session(),
                DispatchMode::Parallel,
            )
            .await;

        match &results[0].outcome {
            ToolOutcome::Failure { error, tool_name } => {
                assert!(error.starts_with("Invalid tool input"));
                assert_eq!(tool_name, "find_talent_matches");
            }
            other => panic!("Expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_capability_without_implementation() {
        let dispatcher = ToolDispatcher::new(tools());
        let results = dispatcher
            .execute(
                &[call("c1", "unimplemented", json!({}))],
                &agent(),
                &session(),
                DispatchMode::Parallel,
            )
            .await;
        assert!(!results[0].is_success());
    }

    #[tokio::test]
    async fn test_capability_dispatches_to_bound_tool() {
        let agent = AgentDefinition::new("talent_scout", "prompt")
            .with_capability(Capability::new("quick_search", "").with_tool("slow_lookup"));
        let dispatcher = ToolDispatcher::new(tools());
        let results = dispatcher
            .execute(
                &[call("c1", "quick_search", json!({}))],
                &agent,
                &session(),
                DispatchMode::Parallel,
            )
            .await;
        assert_eq!(results[0].outcome, ToolOutcome::Success("done".into()));
    }

    #[tokio::test]
    async fn test_panicking_and_failing_tools_do_not_block_siblings() {
        let dispatcher = ToolDispatcher::new(tools());
        for mode in [DispatchMode::Parallel, DispatchMode::Sequential] {
            let results = dispatcher
                .execute(
                    &[
                        call("c1", "explode", json!({})),
                        call("c2", "fail", json!({})),
                        call("c3", "find_talent_matches", json!({"role": "lead"})),
                    ],
                    &agent(),
                    &session(),
                    mode,
                )
                .await;

            let ids: Vec<&str> = results.iter().map(|r| r.call_id.as_str()).collect();
            assert_eq!(ids, vec!["c1", "c2", "c3"]);
            assert!(matches!(&results[0].outcome, ToolOutcome::Failure { error, .. } if error.contains("panicked")));
            assert!(matches!(&results[1].outcome, ToolOutcome::Failure { error, .. } if error.contains("talent db offline")));
            assert!(results[2].is_success());
        }
    }

    #[tokio::test]
    async fn test_parallel_mode_runs_concurrently() {
        let dispatcher = ToolDispatcher::new(tools());
        let requests: Vec<_> = (0..4)
            .map(|i| call(&format!("c{i}"), "slow_lookup", json!({})))
            .collect();

        let start = Instant::now();
        let results = dispatcher
            .execute(&requests, &agent(), &session(), DispatchMode::Parallel)
            .await;

        assert_eq!(results.len(), 4);
        assert!(start.elapsed() < Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_sequential_mode_runs_in_order() {
        let dispatcher = ToolDispatcher::new(tools());
        let requests: Vec<_> = (0..3)
            .map(|i| call(&format!("c{i}"), "slow_lookup", json!({})))
            .collect();

        let start = Instant::now();
        let results = dispatcher
            .execute(&requests, &agent(), &session(), DispatchMode::Sequential)
            .await;

        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(results.iter().all(ToolResult::is_success));
    }

    #[tokio::test]
    async fn test_timeout_captured_as_failure() {
        let dispatcher = ToolDispatcher::new(tools()).with_timeout(Duration::from_millis(10));
        let results = dispatcher
            .execute(
                &[call("c1", "slow_lookup", json!({}))],
                &agent(),
                &session(),
                DispatchMode::Parallel,
            )
            .await;
        assert!(matches!(&results[0].outcome, ToolOutcome::Failure { error, .. } if error.contains("timed out")));
    }

    #[test]
    fn test_result_envelope_format() {
        let ok = serde_json::to_value(ToolResult::success("c1", "3 matches")).unwrap();
        assert_eq!(ok, json!({"call_id": "c1", "success": "3 matches"}));

        let err = ToolResult::failure("c2", "parse_script", &ToolError::NotFound("parse_script".into()));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"call_id": "c2", "failure": {"error": "Tool not found: parse_script", "tool_name": "parse_script"}})
        );
    }

    #[test]
    fn test_result_message_metadata() {
        let msg = ToolResult::success("c1", "ok").to_message("find_talent_matches");
        assert_eq!(msg.role, Role::Tool);
        let metadata = msg.metadata.unwrap();
        assert_eq!(metadata["call_id"], "c1");
        assert_eq!(metadata["tool_name"], "find_talent_matches");
    }
}

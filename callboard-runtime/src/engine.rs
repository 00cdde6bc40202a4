//! Orchestration engine - the bounded multi-agent turn loop.

use crate::config::{EngineConfig, TurnOptions};
use crate::dispatcher::{DispatchMode, ToolDispatcher};
use crate::guardrails::GuardrailEvaluator;
use crate::handoff::{HandoffDescriptor, HandoffDetector};
use crate::history::HistoryPolicy;
use crate::interfaces::{ModelProvider, RuntimeError, SessionStore};
use crate::metrics::{self, MetricTimer};
use crate::prompt::build_system_prompt;
use crate::registry::{AgentDefinition, AgentId, CapabilityRegistry};
use crate::session::Session;
use crate::types::{Message, ModelResponse, Role, ToolCallRequest, TurnInput};
use callboard_tools::ToolRegistry;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a successful `run_turn_loop` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub final_output: Value,
    pub handoffs_performed: Vec<HandoffDescriptor>,
    pub tool_calls_performed: Vec<ToolCallRequest>,
    pub updated_history: Vec<Message>,
    pub current_agent: AgentId,
    pub metadata: Map<String, Value>,
}

/// Drives sessions through model calls, tool dispatch and hand-offs.
///
/// The engine holds no per-session state; every invocation loads the session,
/// works on a private copy and commits it to the store only on success.
pub struct OrchestrationEngine<S, P>
where
    S: SessionStore,
    P: ModelProvider,
{
    registry: Arc<CapabilityRegistry>,
    session_store: Arc<S>,
    provider: Arc<P>,
    dispatcher: ToolDispatcher,
    guardrails: GuardrailEvaluator,
    handoffs: HandoffDetector,
    history: HistoryPolicy,
    config: EngineConfig,
}

impl<S, P> OrchestrationEngine<S, P>
where
    S: SessionStore,
    P: ModelProvider,
{
    /// Create an engine.
    ///
    /// # Errors
    /// Returns `ConfigError` if `config` holds an invalid value.
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        session_store: Arc<S>,
        provider: Arc<P>,
        tools: Arc<ToolRegistry>,
        config: EngineConfig,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;

        let mut dispatcher = ToolDispatcher::new(tools);
        if let Some(timeout) = config.tool_timeout() {
            dispatcher = dispatcher.with_timeout(timeout);
        }

        Ok(Self {
            registry,
            session_store,
            provider,
            dispatcher,
            guardrails: GuardrailEvaluator::new(),
            handoffs: HandoffDetector::new(),
            history: HistoryPolicy::new(config.history_limit),
            config,
        })
    }

    /// Replace the default guardrail rules.
    pub fn with_guardrails(mut self, guardrails: GuardrailEvaluator) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Create and persist a new session. Returns its id.
    pub async fn create_session(
        &self,
        user_id: &str,
        workflow: &str,
        initial_agent: impl Into<AgentId>,
    ) -> Result<String, RuntimeError> {
        let agent = initial_agent.into();
        if !self.registry.contains(&agent) {
            return Err(RuntimeError::AgentNotFound(agent.to_string()));
        }

        let session = Session::new(user_id, workflow, agent);
        self.session_store
            .put(&session, self.config.session_ttl())
            .await?;

        info!(
            "Created session {} for user {} (workflow {}, agent {})",
            session.id, user_id, workflow, session.current_agent
        );
        Ok(session.id)
    }

    /// Load a session, failing with `SessionNotFound` if absent or expired.
    pub async fn get_session(&self, session_id: &str) -> Result<Session, RuntimeError> {
        self.session_store
            .get(session_id)
            .await?
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))
    }

    /// Delete a session. Deleting an unknown session succeeds.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), RuntimeError> {
        self.session_store.delete(session_id).await?;
        info!("Deleted session {}", session_id);
        Ok(())
    }

    fn resolve_agent(&self, id: &AgentId) -> Result<Arc<AgentDefinition>, RuntimeError> {
        self.registry.get(id).ok_or_else(|| {
            error!("Agent {} is not registered", id);
            RuntimeError::AgentNotFound(id.to_string())
        })
    }

    /// Run one turn-loop invocation for `session_id`.
    ///
    /// The session is persisted only when the loop reaches a final answer that
    /// passes the output guardrail; every error leaves the stored copy as it was.
    pub async fn run_turn_loop(
        &self,
        session_id: &str,
        input: impl Into<TurnInput>,
        options: TurnOptions,
    ) -> Result<TurnOutcome, RuntimeError> {
        options.validate()?;
        let timer = MetricTimer::new(metrics::TURN_LOOP_DURATION);

        let mut session = self.get_session(session_id).await?;
        let mut agent = self.resolve_agent(&session.current_agent)?;

        let mut batch = std::mem::take(&mut session.history);
        batch.extend(input.into().into_messages());

        let mode = if options.parallel_tools {
            DispatchMode::Parallel
        } else {
            DispatchMode::Sequential
        };

        let mut turns = 0;
        let mut handoffs_performed = Vec::new();
        let mut tool_calls_performed = Vec::new();

        while turns < options.max_turns {
            if options.guardrails_enabled {
                let verdict = self.guardrails.evaluate_input(&batch);
                if !verdict.passed {
                    let reason = verdict.reason.unwrap_or_default();
                    metrics::increment_guardrail_rejection_count();
                    warn!("Input rejected for session {}: {}", session_id, reason);
                    return Err(RuntimeError::GuardrailRejected(reason));
                }
            }

            let system_prompt = build_system_prompt(
                &agent,
                &session.context,
                options.chain_of_thought_prompting,
            );
            let catalogue = agent.tool_catalogue();

            debug!(
                "Turn {}/{} for session {} with agent {}",
                turns + 1,
                options.max_turns,
                session_id,
                agent.id
            );

            let response = {
                let _model_timer = MetricTimer::new(metrics::MODEL_CALL_LATENCY);
                self.provider
                    .complete(&system_prompt, &batch, &catalogue)
                    .await
                    .map_err(|e| {
                        error!("Model call failed for session {}: {}", session_id, e);
                        e
                    })?
            };
            turns += 1;
            session.touch();

            response
                .validate_version()
                .map_err(RuntimeError::ProviderError)?;

            match response {
                ModelResponse::ToolUse {
                    content,
                    tool_calls,
                    ..
                } => {
                    if tool_calls.is_empty() {
                        return Err(RuntimeError::ProviderError(
                            "Tool-use response carried no tool calls".to_string(),
                        ));
                    }
                    info!(
                        "Agent {} requested {} tool call(s)",
                        agent.id,
                        tool_calls.len()
                    );

                    batch.push(Message::with_metadata(
                        Role::Assistant,
                        Value::String(content.unwrap_or_default()),
                        json!({"tool_calls": tool_calls}),
                    ));

                    let results = self
                        .dispatcher
                        .execute(&tool_calls, &agent, &session, mode)
                        .await;
                    for (call, result) in tool_calls.iter().zip(&results) {
                        batch.push(result.to_message(&call.name));
                    }
                    tool_calls_performed.extend(tool_calls);
                }
                ModelResponse::Terminal { content, .. } => {
                    let text = match &content {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };

                    if let Some(handoff) = self.handoffs.detect(&text, &agent) {
                        let next = self.resolve_agent(&handoff.target)?;
                        info!(
                            "Hand-off {} -> {} for session {}: {}",
                            handoff.source, handoff.target, session_id, handoff.reason
                        );
                        metrics::increment_handoff_count();

                        session.merge_context(&handoff.context);
                        session.current_agent = handoff.target.clone();
                        batch.push(Message::with_metadata(
                            Role::Assistant,
                            content,
                            json!({"handoff": {
                                "source": handoff.source,
                                "target": handoff.target,
                                "reason": handoff.reason
                            }}),
                        ));
                        if let Some(rewrite) = &handoff.input_rewrite {
                            batch = rewrite(batch);
                        }

                        handoffs_performed.push(handoff);
                        agent = next;
                        continue;
                    }

                    let final_output = extract_final_answer(content);
                    if options.guardrails_enabled {
                        let verdict = self.guardrails.evaluate_output(&final_output);
                        if !verdict.passed {
                            let reason = verdict.reason.unwrap_or_default();
                            metrics::increment_guardrail_rejection_count();
                            warn!("Answer rejected for session {}: {}", session_id, reason);
                            return Err(RuntimeError::GuardrailRejected(reason));
                        }
                    }

                    batch.push(Message::assistant(text));
                    session.history = self.history.apply(batch);
                    session.touch();
                    self.session_store
                        .put(&session, self.config.session_ttl())
                        .await?;

                    let elapsed_ms = timer.elapsed_ms();
                    info!(
                        "Session {} finished in {} turn(s), {} tool call(s), {} hand-off(s)",
                        session_id,
                        turns,
                        tool_calls_performed.len(),
                        handoffs_performed.len()
                    );

                    let mut metadata = Map::new();
                    metadata.insert("session_id".into(), json!(session.id));
                    metadata.insert("agent".into(), json!(session.current_agent));
                    metadata.insert("turns".into(), json!(turns));
                    metadata.insert("trace_id".into(), json!(session.trace_id()));
                    metadata.insert("elapsed_ms".into(), json!(elapsed_ms.round() as u64));

                    return Ok(TurnOutcome {
                        final_output,
                        handoffs_performed,
                        tool_calls_performed,
                        updated_history: session.history,
                        current_agent: session.current_agent,
                        metadata,
                    });
                }
            }
        }

        metrics::increment_turn_budget_exceeded_count();
        warn!(
            "Session {} exhausted its budget of {} turns",
            session_id, options.max_turns
        );
        Err(RuntimeError::TurnBudgetExceeded {
            session_id: session_id.to_string(),
            max_turns: options.max_turns,
        })
    }
}

/// JSON object or array text becomes structured output; everything else stays a string.
fn extract_final_answer(content: Value) -> Value {
    match content {
        Value::String(text) => {
            let trimmed = text.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                match serde_json::from_str::<Value>(&text) {
                    Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
                    _ => Value::String(text),
                }
            } else {
                Value::String(text)
            }
        }
        other => other,
    }
}

//! Shared fixtures for engine integration tests.

#![allow(dead_code, clippy::panic, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use callboard_infra::infra::MemoryKvStore;
use callboard_runtime::*;
use callboard_tools::{ExecutionContext, ToolError, ToolRegistry};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One recorded provider invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub catalogue: Vec<Value>,
}

/// Provider that replays a fixed script of responses.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ModelResponse, RuntimeError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ModelResponse, RuntimeError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn replies(responses: Vec<ModelResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, response: Result<ModelResponse, RuntimeError>) {
        self.script.lock().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tool_catalogue: &[Value],
    ) -> Result<ModelResponse, RuntimeError> {
        self.calls.lock().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
            catalogue: tool_catalogue.to_vec(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| Err(RuntimeError::ProviderError("script exhausted".to_string())))
    }
}

/// Session store whose writes can be made to fail.
pub struct FlakyStore {
    inner: AsyncSessionStore<MemoryKvStore>,
    pub fail_puts: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: AsyncSessionStore::new(Arc::new(MemoryKvStore::new())),
            fail_puts: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, RuntimeError> {
        self.inner.get(session_id).await
    }

    async fn put(&self, session: &Session, ttl: Duration) -> Result<(), RuntimeError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(RuntimeError::StoreError("disk write failure".to_string()));
        }
        self.inner.put(session, ttl).await
    }

    async fn delete(&self, session_id: &str) -> Result<(), RuntimeError> {
        self.inner.delete(session_id).await
    }
}

pub fn talent_scout() -> AgentDefinition {
    AgentDefinition::new("talent_scout", "You search the talent pool for casting directors.")
        .with_capability(
            Capability::new("find_talent_matches", "Search the talent pool for a role")
                .with_input_schema(json!({
                    "type": "object",
                    "properties": {"role": {"type": "string"}},
                    "required": ["role"]
                })),
        )
        .with_capability(Capability::new("check_availability", "Check talent availability"))
        .with_handoff(
            HandoffTarget::new("schedule_coordinator", "audition_scheduling")
                .with_context("stage", json!("scheduling")),
        )
}

pub fn schedule_coordinator() -> AgentDefinition {
    AgentDefinition::new("schedule_coordinator", "You schedule auditions and callbacks.")
        .with_capability(Capability::new("book_audition", "Book an audition slot"))
        .with_handoff(HandoffTarget::new("talent_scout", "needs_more_candidates"))
}

pub fn script_analyst() -> AgentDefinition {
    AgentDefinition::new("script_analyst", "You break scripts down into roles.")
        .with_capability(Capability::new("parse_script", "Extract roles from a script"))
        .with_handoff(HandoffTarget::new("talent_scout", "roles_ready"))
}

pub fn registry() -> Arc<CapabilityRegistry> {
    Arc::new(
        CapabilityRegistry::from_definitions([talent_scout(), schedule_coordinator(), script_analyst()])
            .unwrap(),
    )
}

pub fn tools() -> Arc<ToolRegistry> {
    let mut tools = ToolRegistry::new();
    tools
        .register_fn("find_talent_matches", |_ctx: ExecutionContext, input: Value| async move {
            Ok::<_, ToolError>(json!({
                "role": input["role"],
                "candidates": ["A. Rivera", "J. Okafor"]
            }))
        })
        .register_fn("check_availability", |_ctx: ExecutionContext, _input: Value| async move {
            Err::<Value, _>(ToolError::ExecutionFailed("calendar service offline".to_string()))
        })
        .register_fn("book_audition", |_ctx: ExecutionContext, _input: Value| async move {
            Ok::<_, ToolError>(json!("Booked Friday 10:00"))
        });
    Arc::new(tools)
}

pub type TestEngine<S> = OrchestrationEngine<S, ScriptedProvider>;

pub fn engine_with_store<S: SessionStore>(
    store: Arc<S>,
    provider: Arc<ScriptedProvider>,
) -> TestEngine<S> {
    OrchestrationEngine::new(registry(), store, provider, tools(), EngineConfig::default()).unwrap()
}

pub fn memory_engine(
    provider: Arc<ScriptedProvider>,
) -> (TestEngine<AsyncSessionStore<MemoryKvStore>>, Arc<AsyncSessionStore<MemoryKvStore>>) {
    let store = Arc::new(AsyncSessionStore::new(Arc::new(MemoryKvStore::new())));
    (engine_with_store(store.clone(), provider), store)
}

pub fn call(id: &str, name: &str, input: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, input)
}

//! Callboard Runtime
//!
//! Multi-agent orchestration engine: a bounded turn loop over specialised
//! agents with tool dispatch, guardrails, hand-offs and TTL-bound sessions.

pub mod types;
pub mod interfaces;
pub mod registry;
pub mod session;
pub mod config;
pub mod agent_config;
pub mod guardrails;
pub mod handoff;
pub mod dispatcher;
pub mod prompt;
pub mod history;
pub mod engine;
pub mod llm_client;
pub mod runtime_controller;
pub mod async_adapters;
pub mod metrics;

pub use types::{Message, ModelResponse, Role, ToolCallRequest, TurnInput, SCHEMA_VERSION};
pub use interfaces::{ModelProvider, RuntimeError, SessionStore};
pub use registry::{AgentDefinition, AgentId, Capability, CapabilityRegistry, HandoffTarget, InputRewrite};
pub use session::Session;
pub use config::{EngineConfig, TurnOptions};
pub use agent_config::{load_agent_definition, load_agent_definitions, load_registry, InputFilter};
pub use guardrails::{GuardrailEvaluator, GuardrailVerdict};
pub use handoff::{HandoffDescriptor, HandoffDetector};
pub use dispatcher::{DispatchMode, ToolDispatcher, ToolOutcome, ToolResult};
pub use history::HistoryPolicy;
pub use engine::{OrchestrationEngine, TurnOutcome};
pub use llm_client::LLMClient;
pub use runtime_controller::RuntimeController;
pub use async_adapters::AsyncSessionStore;

//! Abstract interfaces for runtime dependencies.

use crate::session::Session;
use crate::types::{Message, ModelResponse};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Runtime errors.
///
/// Tool-level failures never appear here; the dispatcher folds them into
/// tool results that are fed back to the model.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Guardrail rejected: {0}")]
    GuardrailRejected(String),

    #[error("Turn budget exceeded for session {session_id}: {max_turns} turns without a final answer")]
    TurnBudgetExceeded { session_id: String, max_turns: usize },

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Session store error: {0}")]
    StoreError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl RuntimeError {
    /// Whether the caller may retry the whole invocation with the same session id.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RuntimeError::ProviderError(_)
                | RuntimeError::Timeout(_)
                | RuntimeError::StoreError(_)
                | RuntimeError::LockError(_)
        )
    }
}

/// Session persistence interface.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, `None` if it never existed or expired.
    async fn get(&self, session_id: &str) -> Result<Option<Session>, RuntimeError>;

    /// Write a session with the given time-to-live.
    async fn put(&self, session: &Session, ttl: Duration) -> Result<(), RuntimeError>;

    /// Remove a session. Removing a missing session succeeds.
    async fn delete(&self, session_id: &str) -> Result<(), RuntimeError>;
}

/// Language-model capability.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Submit the conversation and tool catalogue, receive a tool-use request
    /// or a terminal answer.
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tool_catalogue: &[serde_json::Value],
    ) -> Result<ModelResponse, RuntimeError>;
}

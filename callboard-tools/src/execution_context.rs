use serde::{Deserialize, Serialize};

/// Per-call context handed to a tool implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub session_id: String,
    pub agent_id: String,
    pub call_id: String,
    pub trace_ref: String,
}

impl ExecutionContext {
    pub fn new(session_id: String, agent_id: String, call_id: String) -> Self {
        Self {
            session_id,
            agent_id,
            call_id,
            trace_ref: uuid::Uuid::new_v4().to_string(),
        }
    }
}

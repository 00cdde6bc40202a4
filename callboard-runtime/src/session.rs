//! Durable per-conversation state.

use crate::registry::AgentId;
use crate::types::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Session record persisted between turn-loop invocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub workflow: String,
    pub current_agent: AgentId,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    /// Start a fresh session with a random id, a trace id and the workflow as group id.
    pub fn new(user_id: impl Into<String>, workflow: impl Into<String>, agent: AgentId) -> Self {
        let now = Utc::now();
        let workflow = workflow.into();
        let mut metadata = Map::new();
        metadata.insert(
            "trace_id".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
        metadata.insert("group_id".to_string(), Value::String(workflow.clone()));

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            workflow,
            current_agent: agent,
            history: Vec::new(),
            context: Map::new(),
            metadata,
            created_at: now,
            last_active: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// Merge hand-off context; incoming keys win.
    pub fn merge_context(&mut self, incoming: &Map<String, Value>) {
        for (key, value) in incoming {
            self.context.insert(key.clone(), value.clone());
        }
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.metadata.get("trace_id").and_then(Value::as_str)
    }
}

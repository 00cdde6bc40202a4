//! Core type definitions for the Callboard runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema version for persisted messages and provider responses.
pub const SCHEMA_VERSION: u32 = 1;

/// Message role in conversation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// A single message in the conversation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub role: Role,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Message {
    /// Create a new message.
    pub fn new(role: Role, content: Value) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            role,
            content,
            metadata: None,
        }
    }

    /// Create a new message with metadata.
    pub fn with_metadata(role: Role, content: Value, metadata: Value) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            role,
            content,
            metadata: Some(metadata),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, Value::String(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Value::String(text.into()))
    }

    /// Textual view of the content: strings as-is, anything else serialized.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Tool calls carried by an assistant tool-use message.
    pub fn tool_calls(&self) -> Vec<ToolCallRequest> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("tool_calls"))
            .and_then(|calls| serde_json::from_value(calls.clone()).ok())
            .unwrap_or_default()
    }

    /// Validate schema version.
    pub fn validate_version(&self) -> Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "Schema version mismatch: expected {}, got {}",
                SCHEMA_VERSION, self.schema_version
            ));
        }
        Ok(())
    }
}

/// One tool invocation requested by the model.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Structured response from the model provider, tagged by stop reason.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "stop_reason", rename_all = "snake_case")]
pub enum ModelResponse {
    ToolUse {
        #[serde(default = "default_schema_version")]
        schema_version: u32,
        #[serde(default)]
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    Terminal {
        #[serde(default = "default_schema_version")]
        schema_version: u32,
        content: Value,
    },
}

impl ModelResponse {
    pub fn tool_use(tool_calls: Vec<ToolCallRequest>) -> Self {
        ModelResponse::ToolUse {
            schema_version: SCHEMA_VERSION,
            content: None,
            tool_calls,
        }
    }

    pub fn terminal(content: impl Into<Value>) -> Self {
        ModelResponse::Terminal {
            schema_version: SCHEMA_VERSION,
            content: content.into(),
        }
    }

    /// Validate schema version.
    pub fn validate_version(&self) -> Result<(), String> {
        let version = match self {
            ModelResponse::ToolUse { schema_version, .. } => *schema_version,
            ModelResponse::Terminal { schema_version, .. } => *schema_version,
        };

        if version != SCHEMA_VERSION {
            return Err(format!(
                "Schema version mismatch: expected {}, got {}",
                SCHEMA_VERSION, version
            ));
        }
        Ok(())
    }
}

/// New input for one turn-loop invocation.
#[derive(Debug, Clone)]
pub enum TurnInput {
    Utterance(String),
    Batch(Vec<Message>),
}

impl TurnInput {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            TurnInput::Utterance(text) => vec![Message::user(text)],
            TurnInput::Batch(messages) => messages,
        }
    }
}

impl From<&str> for TurnInput {
    fn from(text: &str) -> Self {
        TurnInput::Utterance(text.to_string())
    }
}

impl From<String> for TurnInput {
    fn from(text: String) -> Self {
        TurnInput::Utterance(text)
    }
}

impl From<Vec<Message>> for TurnInput {
    fn from(messages: Vec<Message>) -> Self {
        TurnInput::Batch(messages)
    }
}

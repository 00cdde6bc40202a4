//! Capability registry: the static table of agent definitions.

use crate::interfaces::RuntimeError;
use crate::types::Message;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Identifier of an agent variant, e.g. `talent_scout`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for AgentId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AgentId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Rewrites the working batch when a hand-off lands on a new agent.
pub type InputRewrite = Arc<dyn Fn(Vec<Message>) -> Vec<Message> + Send + Sync>;

fn default_schema() -> Value {
    json!({"type": "object"})
}

/// A callable the agent exposes to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_schema")]
    pub input_schema: Value,
    #[serde(default = "default_schema")]
    pub output_schema: Value,
    /// Underlying tool identifiers; the first one backs the capability.
    /// Empty means the tool shares the capability's name.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl Capability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: default_schema(),
            output_schema: default_schema(),
            tools: Vec::new(),
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }

    /// Name of the registered tool this capability dispatches to.
    pub fn tool_name(&self) -> &str {
        self.tools.first().map(String::as_str).unwrap_or(&self.name)
    }

    /// Model-facing entry in OpenAI function format.
    pub fn catalogue_entry(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema
            }
        })
    }
}

/// A permitted hand-off from one agent to another.
#[derive(Clone)]
pub struct HandoffTarget {
    pub target: AgentId,
    pub reason: String,
    pub context: Map<String, Value>,
    pub input_rewrite: Option<InputRewrite>,
}

impl HandoffTarget {
    pub fn new(target: impl Into<AgentId>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reason: reason.into(),
            context: Map::new(),
            input_rewrite: None,
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_input_rewrite(mut self, rewrite: InputRewrite) -> Self {
        self.input_rewrite = Some(rewrite);
        self
    }
}

impl fmt::Debug for HandoffTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffTarget")
            .field("target", &self.target)
            .field("reason", &self.reason)
            .field("context", &self.context)
            .field("input_rewrite", &self.input_rewrite.is_some())
            .finish()
    }
}

/// Immutable agent configuration shared by every session.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub id: AgentId,
    pub system_prompt: String,
    pub capabilities: Vec<Capability>,
    pub handoffs: Vec<HandoffTarget>,
}

impl AgentDefinition {
    pub fn new(id: impl Into<AgentId>, system_prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            system_prompt: system_prompt.into(),
            capabilities: Vec::new(),
            handoffs: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn with_handoff(mut self, handoff: HandoffTarget) -> Self {
        self.handoffs.push(handoff);
        self
    }

    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    pub fn handoff_target(&self, target: &str) -> Option<&HandoffTarget> {
        self.handoffs.iter().find(|h| h.target == target)
    }

    /// Tool catalogue sent to the model, in capability order.
    pub fn tool_catalogue(&self) -> Vec<Value> {
        self.capabilities.iter().map(Capability::catalogue_entry).collect()
    }
}

/// Agent id → definition, read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    agents: HashMap<AgentId, Arc<AgentDefinition>>,
}

impl CapabilityRegistry {
    /// Build and validate a registry from a set of definitions.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = AgentDefinition>,
    ) -> Result<Self, RuntimeError> {
        let mut agents = HashMap::new();
        for definition in definitions {
            if definition.id.as_str().trim().is_empty() {
                return Err(RuntimeError::ConfigError(
                    "Agent id must be non-empty".to_string(),
                ));
            }
            let id = definition.id.clone();
            if agents.insert(id.clone(), Arc::new(definition)).is_some() {
                return Err(RuntimeError::ConfigError(format!(
                    "Duplicate agent id: {}",
                    id
                )));
            }
        }

        let registry = Self { agents };
        registry.validate()?;
        Ok(registry)
    }

    fn validate(&self) -> Result<(), RuntimeError> {
        for definition in self.agents.values() {
            let mut names = HashSet::new();
            for capability in &definition.capabilities {
                if !names.insert(capability.name.as_str()) {
                    return Err(RuntimeError::ConfigError(format!(
                        "Agent {} declares capability {} twice",
                        definition.id, capability.name
                    )));
                }
                for schema in [&capability.input_schema, &capability.output_schema] {
                    callboard_tools::validate_schema(schema).map_err(|e| {
                        RuntimeError::ConfigError(format!(
                            "Agent {} capability {}: {}",
                            definition.id, capability.name, e
                        ))
                    })?;
                }
            }

            for handoff in &definition.handoffs {
                if handoff.target == definition.id {
                    return Err(RuntimeError::ConfigError(format!(
                        "Agent {} cannot hand off to itself",
                        definition.id
                    )));
                }
                if !self.agents.contains_key(&handoff.target) {
                    return Err(RuntimeError::ConfigError(format!(
                        "Agent {} hands off to unknown agent {}",
                        definition.id, handoff.target
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<AgentDefinition>> {
        self.agents.get(id).cloned()
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    /// Registered agent ids, sorted.
    pub fn ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn scout() -> AgentDefinition {
        AgentDefinition::new("talent_scout", "You find talent.")
            .with_capability(
                Capability::new("find_talent_matches", "Search the talent pool").with_input_schema(
                    json!({
                        "type": "object",
                        "properties": {"role": {"type": "string"}},
                        "required": ["role"]
                    }),
                ),
            )
            .with_handoff(HandoffTarget::new("schedule_coordinator", "audition_scheduling"))
    }

    fn coordinator() -> AgentDefinition {
        AgentDefinition::new("schedule_coordinator", "You schedule auditions.")
    }

    #[test]
    fn test_registry_lookup() {
        let registry = CapabilityRegistry::from_definitions([scout(), coordinator()]).unwrap();

        assert_eq!(registry.len(), 2);
        let agent = registry.get(&AgentId::from("talent_scout")).unwrap();
        assert!(agent.capability("find_talent_matches").is_some());
        assert!(agent.capability("parse_script").is_none());
        assert!(agent.handoff_target("schedule_coordinator").is_some());
        assert!(registry.get(&AgentId::from("ghost")).is_none());
    }

    #[test]
    fn test_tool_catalogue_format() {
        let catalogue = scout().tool_catalogue();
        assert_eq!(catalogue.len(), 1);
        assert_eq!(catalogue[0]["type"], "function");
        assert_eq!(catalogue[0]["function"]["name"], "find_talent_matches");
        assert_eq!(catalogue[0]["function"]["parameters"]["required"][0], "role");
    }

    #[test]
    fn test_unknown_handoff_target_rejected() {
        let result = CapabilityRegistry::from_definitions([scout()]);
        match result {
            Err(RuntimeError::ConfigError(msg)) => assert!(msg.contains("unknown agent")),
            other => panic!("Expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_agent_rejected() {
        let result = CapabilityRegistry::from_definitions([coordinator(), coordinator()]);
        assert!(matches!(result, Err(RuntimeError::ConfigError(msg)) if msg.contains("Duplicate")));
    }

    #[test]
    fn test_duplicate_capability_rejected() {
        let agent = coordinator()
            .with_capability(Capability::new("book_room", ""))
            .with_capability(Capability::new("book_room", ""));
        let result = CapabilityRegistry::from_definitions([agent]);
        assert!(matches!(result, Err(RuntimeError::ConfigError(msg)) if msg.contains("twice")));
    }

    #[test]
    fn test_self_handoff_rejected() {
        let agent = coordinator().with_handoff(HandoffTarget::new("schedule_coordinator", "loop"));
        assert!(CapabilityRegistry::from_definitions([agent]).is_err());
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let agent = coordinator().with_capability(
            Capability::new("book_room", "").with_input_schema(json!({"type": 12})),
        );
        assert!(CapabilityRegistry::from_definitions([agent]).is_err());
    }

    #[test]
    fn test_agent_id_comparisons() {
        let id = AgentId::from("talent_scout");
        assert_eq!(id, "talent_scout");
        assert_eq!(id.to_string(), "talent_scout");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""talent_scout""#);
    }

    #[test]
    fn test_handoff_target_debug_hides_closure() {
        let target = HandoffTarget::new("schedule_coordinator", "x")
            .with_input_rewrite(Arc::new(|messages: Vec<Message>| messages));
        let rendered = format!("{target:?}");
        assert!(rendered.contains("input_rewrite: true"));
    }
}

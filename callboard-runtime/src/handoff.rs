//! Hand-off directive detection.
//!
//! Agents are prompted to end an answer with `HANDOFF: <target_id> - <reason>`
//! when another agent should take over. A directive naming a target outside
//! the current agent's permitted list is ignored.

use crate::registry::{AgentDefinition, AgentId, InputRewrite};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

pub const DIRECTIVE_KEYWORD: &str = "HANDOFF";

/// A validated hand-off, consumed by the engine right after detection.
#[derive(Clone, Serialize)]
pub struct HandoffDescriptor {
    pub source: AgentId,
    pub target: AgentId,
    pub reason: String,
    pub context: Map<String, Value>,
    #[serde(skip)]
    pub input_rewrite: Option<InputRewrite>,
}

impl fmt::Debug for HandoffDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffDescriptor")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("reason", &self.reason)
            .field("context", &self.context)
            .field("input_rewrite", &self.input_rewrite.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct HandoffDetector {
    directive: Option<Regex>,
}

impl HandoffDetector {
    pub fn new() -> Self {
        let pattern = format!(
            r"(?im)\b{}\s*:\s*([A-Za-z0-9_.\-]+)\s+-\s+([^\r\n]+)",
            DIRECTIVE_KEYWORD
        );
        Self {
            directive: Regex::new(&pattern).ok(),
        }
    }

    /// Extract the first directive as `(target, reason)` without checking permissions.
    pub fn parse(&self, text: &str) -> Option<(String, String)> {
        let captures = self.directive.as_ref()?.captures(text)?;
        let target = captures.get(1)?.as_str().to_string();
        let reason = captures.get(2)?.as_str().trim().to_string();
        Some((target, reason))
    }

    /// Return a descriptor when `answer` carries a directive to a permitted target.
    pub fn detect(&self, answer: &str, agent: &AgentDefinition) -> Option<HandoffDescriptor> {
        let (target, reason) = self.parse(answer)?;

        let Some(permitted) = agent.handoff_target(&target) else {
            warn!(
                "Ignoring hand-off from {} to unpermitted target {}",
                agent.id, target
            );
            return None;
        };

        debug!("Detected hand-off {} -> {} ({})", agent.id, target, reason);
        Some(HandoffDescriptor {
            source: agent.id.clone(),
            target: permitted.target.clone(),
            reason,
            context: permitted.context.clone(),
            input_rewrite: permitted.input_rewrite.clone(),
        })
    }
}

impl Default for HandoffDetector {
    fn default() -> Self {
        Self::new()
    }
}

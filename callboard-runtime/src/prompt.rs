//! Outbound system prompt assembly.

use crate::handoff::DIRECTIVE_KEYWORD;
use crate::registry::AgentDefinition;
use serde_json::{Map, Value};

pub const CHAIN_OF_THOUGHT_SCAFFOLD: &str = "Before answering, reason step by step: \
restate what the user needs, decide which capability (if any) moves the request forward, \
and check the result before you reply. Keep the reasoning to yourself and give only the answer.";

/// Build the system prompt sent with every model call for `agent`.
///
/// Sections appear in a fixed order: the reasoning scaffold (when enabled),
/// the agent prompt, hand-off instructions (only when the agent may hand
/// off), then session context.
pub fn build_system_prompt(
    agent: &AgentDefinition,
    context: &Map<String, Value>,
    chain_of_thought: bool,
) -> String {
    let mut sections = Vec::new();
    if chain_of_thought {
        sections.push(CHAIN_OF_THOUGHT_SCAFFOLD.to_string());
    }
    sections.push(agent.system_prompt.trim().to_string());

    if !agent.handoffs.is_empty() {
        let mut lines = vec![format!(
            "If another agent should take over, end your answer with a single line \
             `{}: <agent_id> - <reason>`. You may hand off to:",
            DIRECTIVE_KEYWORD
        )];
        for handoff in &agent.handoffs {
            lines.push(format!("- {} ({})", handoff.target, handoff.reason));
        }
        sections.push(lines.join("\n"));
    }

    if !context.is_empty() {
        let mut lines = vec!["Session context:".to_string()];
        for (key, value) in context {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            lines.push(format!("- {}: {}", key, rendered));
        }
        sections.push(lines.join("\n"));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HandoffTarget;
    use serde_json::json;

    #[test]
    fn test_plain_prompt() {
        let agent = AgentDefinition::new("script_analyst", "You break down scripts.");
        let prompt = build_system_prompt(&agent, &Map::new(), false);
        assert_eq!(prompt, "You break down scripts.");
    }

    #[test]
    fn test_scaffold_prepended() {
        let agent = AgentDefinition::new("script_analyst", "You break down scripts.");
        let prompt = build_system_prompt(&agent, &Map::new(), true);
        assert_eq!(
            prompt,
            format!("{}\n\nYou break down scripts.", CHAIN_OF_THOUGHT_SCAFFOLD)
        );
    }

    #[test]
    fn test_full_prompt_sections_in_order() {
        let agent = AgentDefinition::new("talent_scout", "You find talent.")
            .with_handoff(HandoffTarget::new("schedule_coordinator", "audition_scheduling"));
        let mut context = Map::new();
        context.insert("production".into(), json!("Hamlet"));
        context.insert("roles".into(), json!(3));

        let prompt = build_system_prompt(&agent, &context, true);

        let handoff_at = prompt.find("HANDOFF: <agent_id> - <reason>").unwrap_or(usize::MAX);
        let target_at = prompt.find("- schedule_coordinator (audition_scheduling)").unwrap_or(usize::MAX);
        let context_at = prompt.find("- production: Hamlet").unwrap_or(usize::MAX);
        let agent_at = prompt.find("You find talent.").unwrap_or(usize::MAX);

        assert!(prompt.starts_with(CHAIN_OF_THOUGHT_SCAFFOLD));
        assert!(agent_at < handoff_at);
        assert!(handoff_at < target_at);
        assert!(target_at < context_at);
        assert!(context_at < usize::MAX);
        assert!(prompt.contains("- roles: 3"));
    }
}

//! Agent definition loader.
//!
//! One YAML file per agent:
//!
//! ```yaml
//! id: talent_scout
//! prompt_file: talent_scout.md
//! capabilities:
//!   - name: find_talent_matches
//!     description: Search the talent pool for a role
//!     input_schema: { type: object, required: [role] }
//! handoffs:
//!   - target: schedule_coordinator
//!     reason: audition_scheduling
//!     context: { stage: scheduling }
//!     input_filter: drop_tool_messages
//! ```

use crate::interfaces::RuntimeError;
use crate::registry::{AgentDefinition, Capability, CapabilityRegistry, HandoffTarget, InputRewrite};
use crate::types::{Message, Role};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Named input rewrites selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFilter {
    /// Remove tool results and the assistant messages that requested them.
    DropToolMessages,
    /// Keep only the most recent user message.
    LastUserMessage,
}

impl InputFilter {
    pub fn into_rewrite(self) -> InputRewrite {
        match self {
            InputFilter::DropToolMessages => Arc::new(|messages: Vec<Message>| {
                messages
                    .into_iter()
                    .filter(|m| m.role != Role::Tool && m.tool_calls().is_empty())
                    .collect()
            }),
            InputFilter::LastUserMessage => Arc::new(|messages: Vec<Message>| {
                messages
                    .into_iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .into_iter()
                    .collect()
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawHandoff {
    target: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    context: Map<String, Value>,
    #[serde(default)]
    input_filter: Option<InputFilter>,
}

#[derive(Debug, Deserialize)]
struct RawAgent {
    id: String,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    prompt_file: Option<String>,
    #[serde(default)]
    capabilities: Vec<Capability>,
    #[serde(default)]
    handoffs: Vec<RawHandoff>,
}

/// Load one agent definition from a YAML file.
///
/// `prompt_file` is resolved relative to the YAML file and wins over an
/// inline `prompt`.
///
/// # Errors
/// Returns `ConfigError` if the file or prompt file is missing, the YAML is
/// invalid, or a required field is empty.
pub fn load_agent_definition(config_path: impl AsRef<Path>) -> Result<AgentDefinition, RuntimeError> {
    let config_file = config_path.as_ref();

    if !config_file.exists() {
        return Err(RuntimeError::ConfigError(format!(
            "Config file not found: {}",
            config_file.display()
        )));
    }

    let content = std::fs::read_to_string(config_file)?;
    if content.trim().is_empty() {
        return Err(RuntimeError::ConfigError(format!(
            "Config file is empty: {}",
            config_file.display()
        )));
    }

    let raw: RawAgent = serde_yaml::from_str(&content).map_err(|e| {
        RuntimeError::ConfigError(format!("Invalid YAML in {}: {}", config_file.display(), e))
    })?;

    if raw.id.trim().is_empty() {
        return Err(RuntimeError::ConfigError(
            "Config missing required field: id".to_string(),
        ));
    }

    let system_prompt = match (&raw.prompt_file, &raw.prompt) {
        (Some(file), _) => {
            let prompt_path = resolve_relative(config_file, file);
            if !prompt_path.exists() {
                return Err(RuntimeError::ConfigError(format!(
                    "Prompt file not found: {}",
                    prompt_path.display()
                )));
            }
            std::fs::read_to_string(&prompt_path)?
        }
        (None, Some(prompt)) => prompt.clone(),
        (None, None) => String::new(),
    };

    if system_prompt.trim().is_empty() {
        return Err(RuntimeError::ConfigError(format!(
            "Agent {} has no prompt or prompt_file",
            raw.id
        )));
    }

    let mut definition = AgentDefinition::new(raw.id, system_prompt);
    definition.capabilities = raw.capabilities;
    for handoff in raw.handoffs {
        let mut target = HandoffTarget::new(handoff.target, handoff.reason);
        target.context = handoff.context;
        if let Some(filter) = handoff.input_filter {
            target = target.with_input_rewrite(filter.into_rewrite());
        }
        definition = definition.with_handoff(target);
    }

    debug!(
        "Loaded agent {} with {} capabilities and {} hand-off targets",
        definition.id,
        definition.capabilities.len(),
        definition.handoffs.len()
    );
    Ok(definition)
}

fn resolve_relative(config_file: &Path, file: &str) -> PathBuf {
    if Path::new(file).is_absolute() {
        PathBuf::from(file)
    } else {
        config_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(file)
    }
}

/// Load every `*.yaml` / `*.yml` file in `dir`, sorted by file name.
pub fn load_agent_definitions(dir: impl AsRef<Path>) -> Result<Vec<AgentDefinition>, RuntimeError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(RuntimeError::ConfigError(format!(
            "Agents directory not found: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| load_agent_definition(path.as_path()))
        .collect()
}

/// Load and validate the registry for an agents directory.
pub fn load_registry(dir: impl AsRef<Path>) -> Result<CapabilityRegistry, RuntimeError> {
    let definitions = load_agent_definitions(dir.as_ref())?;
    if definitions.is_empty() {
        return Err(RuntimeError::ConfigError(format!(
            "No agent definitions in {}",
            dir.as_ref().display()
        )));
    }

    let registry = CapabilityRegistry::from_definitions(definitions)?;
    info!("Loaded {} agents from {}", registry.len(), dir.as_ref().display());
    Ok(registry)
}

//! Engine and per-invocation options.

use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::interfaces::RuntimeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_max_turns() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// Options for one `run_turn_loop` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOptions {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_true")]
    pub parallel_tools: bool,
    #[serde(default = "default_true")]
    pub guardrails_enabled: bool,
    #[serde(default = "default_true")]
    pub chain_of_thought_prompting: bool,
}

impl TurnOptions {
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.parallel_tools = parallel;
        self
    }

    pub fn with_guardrails(mut self, enabled: bool) -> Self {
        self.guardrails_enabled = enabled;
        self
    }

    pub fn with_chain_of_thought(mut self, enabled: bool) -> Self {
        self.chain_of_thought_prompting = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.max_turns == 0 {
            return Err(RuntimeError::ConfigError(
                "max_turns must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            parallel_tools: true,
            guardrails_enabled: true,
            chain_of_thought_prompting: true,
        }
    }
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// Engine-wide settings fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub tool_timeout_ms: Option<u64>,
    #[serde(default)]
    pub defaults: TurnOptions,
}

impl EngineConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.session_ttl_secs == 0 {
            return Err(RuntimeError::ConfigError(
                "session_ttl_secs must be positive".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(RuntimeError::ConfigError(
                "history_limit must be positive".to_string(),
            ));
        }
        if self.tool_timeout_ms == Some(0) {
            return Err(RuntimeError::ConfigError(
                "tool_timeout_ms must be positive when set".to_string(),
            ));
        }
        self.defaults.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl_secs(),
            history_limit: default_history_limit(),
            tool_timeout_ms: None,
            defaults: TurnOptions::default(),
        }
    }
}

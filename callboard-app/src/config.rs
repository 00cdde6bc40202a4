use anyhow::{bail, Context, Result};
use callboard_runtime::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn default_api_key_env() -> String {
    "CALLBOARD_API_KEY".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_max_concurrent_sessions() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl ProviderConfig {
    pub fn base_url(&self) -> String {
        std::env::var("CALLBOARD_LLM_ENDPOINT").unwrap_or_else(|_| self.base_url.clone())
    }

    pub fn model(&self) -> String {
        std::env::var("CALLBOARD_LLM_MODEL").unwrap_or_else(|_| self.model.clone())
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub agents_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub default_user: String,
    pub default_workflow: String,
    pub initial_agent: String,
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    #[serde(default)]
    pub metrics_addr: Option<String>,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.base_url.trim().is_empty() {
            bail!("provider.base_url cannot be empty");
        }
        if self.provider.model.trim().is_empty() {
            bail!("provider.model cannot be empty");
        }
        if self.initial_agent.trim().is_empty() {
            bail!("initial_agent cannot be empty");
        }
        if self.max_concurrent_sessions == 0 {
            bail!("max_concurrent_sessions must be positive");
        }
        self.engine
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid engine section: {}", e))?;
        Ok(())
    }
}

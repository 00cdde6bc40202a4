use anyhow::{Context, Result};
use callboard_app::config::{Config, DEFAULT_CONFIG_PATH};
use callboard_app::repl::Repl;
use callboard_app::sample_tools::sample_tool_registry;
use callboard_infra::infra::{FileKvStore, LockManager};
use callboard_runtime::{
    load_registry, AsyncSessionStore, LLMClient, OrchestrationEngine, RuntimeController,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn config_path() -> PathBuf {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::load(config_path())?;

    #[cfg(feature = "prometheus")]
    if let Some(addr) = &config.metrics_addr {
        let addr = addr
            .parse()
            .with_context(|| format!("Invalid metrics_addr: {}", addr))?;
        callboard_runtime::metrics::install_prometheus_exporter(addr)?;
        info!("Prometheus exporter listening on {}", addr);
    }
    #[cfg(not(feature = "prometheus"))]
    if config.metrics_addr.is_some() {
        warn!("metrics_addr is set but the prometheus feature is disabled");
    }

    let registry = load_registry(&config.agents_dir)?;
    info!(
        "Loaded {} agents from {}",
        registry.len(),
        config.agents_dir.display()
    );

    let kv = FileKvStore::new(&config.sessions_dir)
        .with_context(|| format!("Failed to open {}", config.sessions_dir.display()))?;
    let store = Arc::new(AsyncSessionStore::new(Arc::new(kv)));

    let mut client = LLMClient::new(
        config.provider.base_url(),
        config.provider.model(),
        config.provider.max_retries,
    );
    match config.provider.api_key() {
        Some(key) => client = client.with_api_key(key),
        None => warn!(
            "{} is not set; calling the provider without credentials",
            config.provider.api_key_env
        ),
    }
    info!("Using model {}", client.model());

    let options = config.engine.defaults;
    let engine = Arc::new(OrchestrationEngine::new(
        Arc::new(registry),
        store,
        Arc::new(client),
        Arc::new(sample_tool_registry()),
        config.engine.clone(),
    )?);

    let mut controller =
        RuntimeController::with_max_concurrent_sessions(engine.clone(), config.max_concurrent_sessions)
            .with_session_locks(Arc::new(LockManager::new(Duration::from_secs(30))));
    if let Some(secs) = config.deadline_secs {
        controller = controller.with_deadline(Duration::from_secs(secs));
    }

    let session_id = engine
        .create_session(
            &config.default_user,
            &config.default_workflow,
            config.initial_agent.as_str(),
        )
        .await?;
    info!("Started session {}", session_id);

    let mut repl = Repl::new(
        controller,
        session_id,
        config.default_user.clone(),
        config.default_workflow.clone(),
        config.initial_agent.clone(),
        options,
    );
    repl.run().await
}

//! Runtime controller - caller-side front for transports.

use crate::config::TurnOptions;
use crate::engine::{OrchestrationEngine, TurnOutcome};
use crate::interfaces::{ModelProvider, RuntimeError, SessionStore};
use crate::types::TurnInput;
use callboard_infra::infra::LockManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Wraps an engine with a global concurrency limit, optional per-session
/// serialization and an optional wall-clock deadline.
pub struct RuntimeController<S, P>
where
    S: SessionStore,
    P: ModelProvider,
{
    engine: Arc<OrchestrationEngine<S, P>>,
    concurrency_limiter: Arc<Semaphore>,
    session_locks: Option<Arc<LockManager>>,
    deadline: Option<Duration>,
}

impl<S, P> RuntimeController<S, P>
where
    S: SessionStore,
    P: ModelProvider,
{
    pub fn new(engine: Arc<OrchestrationEngine<S, P>>) -> Self {
        Self::with_max_concurrent_sessions(engine, 100)
    }

    pub fn with_max_concurrent_sessions(
        engine: Arc<OrchestrationEngine<S, P>>,
        max_concurrent_sessions: usize,
    ) -> Self {
        Self {
            engine,
            concurrency_limiter: Arc::new(Semaphore::new(max_concurrent_sessions)),
            session_locks: None,
            deadline: None,
        }
    }

    /// Serialize invocations that share a session id.
    pub fn with_session_locks(mut self, locks: Arc<LockManager>) -> Self {
        self.session_locks = Some(locks);
        self
    }

    /// Fail invocations that run longer than `deadline` with a retryable timeout.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn engine(&self) -> &OrchestrationEngine<S, P> {
        &self.engine
    }

    /// Execute one turn-loop invocation under the controller's policies.
    pub async fn execute(
        &self,
        session_id: &str,
        input: impl Into<TurnInput>,
        options: TurnOptions,
    ) -> Result<TurnOutcome, RuntimeError> {
        let _permit = self
            .concurrency_limiter
            .acquire()
            .await
            .map_err(|e| RuntimeError::LockError(format!("Concurrency limit error: {}", e)))?;

        let _lock = match &self.session_locks {
            Some(locks) => {
                let lock = locks
                    .acquire(session_id)
                    .await
                    .map_err(|e| RuntimeError::LockError(e.to_string()))?;
                debug!(
                    "Acquired lock for session {} after {:?}",
                    session_id,
                    lock.wait_time()
                );
                Some(lock)
            }
            None => None,
        };

        info!("Processing request for session {}", session_id);
        let run = self.engine.run_turn_loop(session_id, input, options);

        match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, run).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "Session {} exceeded its deadline of {:?}",
                        session_id, deadline
                    );
                    Err(RuntimeError::Timeout(deadline))
                }
            },
            None => run.await,
        }
    }
}

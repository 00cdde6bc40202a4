use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock timeout for session: {0}")]
    Timeout(String),
}

type LockTable = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Keyed async locks for callers that want one turn loop per session at a time.
///
/// A session's entry is dropped when its last holder releases and nobody is waiting.
#[derive(Clone)]
pub struct LockManager {
    locks: LockTable,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Wait for the lock on `session_id`, up to the configured timeout.
    pub async fn acquire(&self, session_id: &str) -> Result<SessionLock, LockError> {
        let start = Instant::now();

        let slot = {
            let mut locks = self.locks.lock();
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let guard = tokio::time::timeout(self.timeout, slot.lock_owned())
            .await
            .map_err(|_| LockError::Timeout(session_id.to_string()))?;

        Ok(SessionLock {
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
            session_id: session_id.to_string(),
            wait_time: start.elapsed(),
        })
    }

    pub fn tracked_sessions(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Held for the duration of one guarded invocation; released on drop.
pub struct SessionLock {
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockTable,
    session_id: String,
    wait_time: Duration,
}

impl SessionLock {
    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        // Waiters hold a clone of the slot, so a count of one means idle.
        if locks
            .get(&self.session_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            locks.remove(&self.session_id);
        }
    }
}

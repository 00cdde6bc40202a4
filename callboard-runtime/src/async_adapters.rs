use crate::interfaces::{RuntimeError, SessionStore};
use crate::session::Session;
use async_trait::async_trait;
use callboard_infra::infra::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;

/// Async `SessionStore` over any synchronous key-value backend.
///
/// Sessions are stored as JSON under `session:<id>`; backend calls run on the
/// blocking pool.
pub struct AsyncSessionStore<K: KeyValueStore + 'static> {
    inner: Arc<K>,
}

impl<K: KeyValueStore + 'static> AsyncSessionStore<K> {
    pub fn new(inner: Arc<K>) -> Self {
        Self { inner }
    }

    fn key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }
}

#[async_trait]
impl<K: KeyValueStore + 'static> SessionStore for AsyncSessionStore<K> {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, RuntimeError> {
        let inner = self.inner.clone();
        let key = Self::key(session_id);

        let value = tokio::task::spawn_blocking(move || {
            inner
                .get(&key)
                .map_err(|e| RuntimeError::StoreError(e.to_string()))
        })
        .await
        .map_err(|e| RuntimeError::StoreError(e.to_string()))??;

        match value {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, session: &Session, ttl: Duration) -> Result<(), RuntimeError> {
        let inner = self.inner.clone();
        let key = Self::key(&session.id);
        let value = serde_json::to_value(session)?;

        tokio::task::spawn_blocking(move || {
            inner
                .set(&key, &value, ttl)
                .map_err(|e| RuntimeError::StoreError(e.to_string()))
        })
        .await
        .map_err(|e| RuntimeError::StoreError(e.to_string()))?
    }

    async fn delete(&self, session_id: &str) -> Result<(), RuntimeError> {
        let inner = self.inner.clone();
        let key = Self::key(session_id);

        tokio::task::spawn_blocking(move || {
            inner
                .delete(&key)
                .map_err(|e| RuntimeError::StoreError(e.to_string()))
        })
        .await
        .map_err(|e| RuntimeError::StoreError(e.to_string()))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::registry::AgentId;
    use crate::types::Message;
    use callboard_infra::infra::{FileKvStore, MemoryKvStore};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_round_trip_and_delete() {
        let store = AsyncSessionStore::new(Arc::new(MemoryKvStore::new()));
        let mut session = Session::new("user", "open_call", AgentId::from("talent_scout"));
        session.history.push(Message::user("find a lead"));

        store.put(&session, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get(&session.id).await.unwrap(), Some(session.clone()));

        store.delete(&session.id).await.unwrap();
        assert!(store.get(&session.id).await.unwrap().is_none());
        store.delete(&session.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_backend() {
        let temp_dir = TempDir::new().unwrap();
        let store = AsyncSessionStore::new(Arc::new(FileKvStore::new(temp_dir.path()).unwrap()));
        let session = Session::new("user", "open_call", AgentId::from("talent_scout"));

        store.put(&session, Duration::from_secs(60)).await.unwrap();
        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_agent, "talent_scout");
    }

    #[tokio::test]
    async fn test_expired_session_is_missing() {
        let store = AsyncSessionStore::new(Arc::new(MemoryKvStore::new()));
        let session = Session::new("user", "open_call", AgentId::from("talent_scout"));

        store.put(&session, Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.get(&session.id).await.unwrap().is_none());
    }
}

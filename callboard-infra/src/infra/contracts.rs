use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Invalid ttl: {0}")]
    InvalidTtl(String),
}

/// Durable key-value store with per-entry expiry.
///
/// Expired entries behave exactly like missing ones.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, KvStoreError>;

    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), KvStoreError>;

    fn delete(&self, key: &str) -> Result<(), KvStoreError>;
}

pub(crate) fn expiry_from_now(ttl: Duration) -> Result<chrono::DateTime<chrono::Utc>, KvStoreError> {
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| KvStoreError::InvalidTtl(e.to_string()))?;
    chrono::Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| KvStoreError::InvalidTtl("expiry overflows".to_string()))
}

use crate::infra::contracts::{expiry_from_now, KeyValueStore, KvStoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::warn;

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    expires_at: DateTime<Utc>,
    value: Value,
}

/// One JSON document per key under `base_path`.
///
/// Every write goes to its own temp file and is renamed into place, so
/// concurrent writers to one key resolve to last-write-wins and a reader
/// never sees a half-written entry.
pub struct FileKvStore {
    base_path: PathBuf,
}

impl FileKvStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, KvStoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, KvStoreError> {
        if key.is_empty() || key.contains("..") || key.contains('/') || key.contains('\\') {
            return Err(KvStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(format!("{}.json", encode_key(key))))
    }

    /// Delete every expired entry on disk. Unreadable files are left alone.
    pub fn purge_expired(&self) -> Result<usize, KvStoreError> {
        let now = Utc::now();
        let mut purged = 0;
        for dir_entry in fs::read_dir(&self.base_path)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            if let Ok(stored) = serde_json::from_str::<StoredEntry>(&content) {
                if stored.expires_at <= now {
                    fs::remove_file(&path)?;
                    purged += 1;
                }
            }
        }
        Ok(purged)
    }
}

/// `[A-Za-z0-9_-]` pass through; every other byte becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>, KvStoreError> {
        let path = self.entry_path(key)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredEntry = serde_json::from_str(&content).map_err(|e| {
            warn!("Unreadable entry {}: {}", path.display(), e);
            KvStoreError::Json(e)
        })?;

        if stored.expires_at <= Utc::now() {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(None);
        }

        Ok(Some(stored.value))
    }

    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), KvStoreError> {
        let path = self.entry_path(key)?;
        let stored = StoredEntry {
            expires_at: expiry_from_now(ttl)?,
            value: value.clone(),
        };

        let json = serde_json::to_string(&stored)?;
        let mut temp = NamedTempFile::new_in(&self.base_path)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| e.error)?;

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KvStoreError> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

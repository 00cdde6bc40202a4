use callboard_infra::infra::{KeyValueStore, MemoryKvStore};
use serde_json::json;
use std::time::Duration;

#[test]
fn test_missing_key_returns_none() {
    let store = MemoryKvStore::new();
    assert!(store.get("session:missing").unwrap().is_none());
}

#[test]
fn test_set_and_get() {
    let store = MemoryKvStore::new();
    let value = json!({"id": "abc", "current_agent": "talent_scout"});

    store.set("session:abc", &value, Duration::from_secs(60)).unwrap();

    assert_eq!(store.get("session:abc").unwrap(), Some(value));
}

#[test]
fn test_set_overwrites() {
    let store = MemoryKvStore::new();
    store.set("k", &json!(1), Duration::from_secs(60)).unwrap();
    store.set("k", &json!(2), Duration::from_secs(60)).unwrap();

    assert_eq!(store.get("k").unwrap(), Some(json!(2)));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete() {
    let store = MemoryKvStore::new();
    store.set("k", &json!("v"), Duration::from_secs(60)).unwrap();
    store.delete("k").unwrap();

    assert!(store.get("k").unwrap().is_none());
    // Deleting again is not an error
    store.delete("k").unwrap();
}

#[test]
fn test_expired_entry_is_missing() {
    let store = MemoryKvStore::new();
    store.set("k", &json!("v"), Duration::from_millis(20)).unwrap();

    std::thread::sleep(Duration::from_millis(60));

    assert!(store.get("k").unwrap().is_none());
    assert!(store.is_empty());
}

#[test]
fn test_purge_expired() {
    let store = MemoryKvStore::new();
    store.set("short", &json!(1), Duration::from_millis(10)).unwrap();
    store.set("long", &json!(2), Duration::from_secs(60)).unwrap();

    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(store.purge_expired(), 1);
    assert_eq!(store.len(), 1);
    assert!(store.get("long").unwrap().is_some());
}

#[test]
fn test_empty_key_rejected() {
    let store = MemoryKvStore::new();
    assert!(store.set("", &json!(1), Duration::from_secs(1)).is_err());
}

pub mod contracts;
pub mod file_store;
pub mod lock_manager;
pub mod memory_store;

pub use contracts::{KeyValueStore, KvStoreError};
pub use file_store::FileKvStore;
pub use lock_manager::{LockError, LockManager, SessionLock};
pub use memory_store::MemoryKvStore;

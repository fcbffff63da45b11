//! Batch Storage
//!
//! Raw batches and result records live in an external key-value store. The
//! pipeline only ever sees the [`KeyValueStore`] trait, so the production
//! Redis backend and the in-memory test backend are interchangeable.

mod memory;
mod redis_store;

pub use self::memory::InMemoryStore;
pub use self::redis_store::RedisStore;

/// Trait for pluggable key-value backends
///
/// Implementations must be thread-safe (Send + Sync): parallel passes call
/// them from every worker at once. Atomicity is per key; nothing here
/// coordinates writers across keys.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value under `key`, `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Create or overwrite `key`.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// All keys matching a glob pattern (`*` and `?`), each listed once.
    fn list_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Delete `keys`, returning how many existed.
    fn delete(&self, keys: &[String]) -> Result<usize, StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("command error: {0}")]
    Command(String),
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

//! Task persistence.
//!
//! A small key/value [`Storage`] trait with a Redis backend and an
//! in-process fallback, plus the [`TaskStore`] cache the orchestrator
//! works against. Which backend is used is decided once at startup by
//! [`connect_storage`].

mod memory;
mod redis_store;
mod task_store;

use crate::config::ServerConfig;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use memory::MemoryStorage;
pub use redis_store::RedisStorage;
pub use task_store::TaskStore;

/// How long a persisted task record lives after its last write.
pub const TASK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key pattern matching every persisted task record.
pub const TASK_KEY_PATTERN: &str = "task:*";

/// String key/value store with per-key expiry.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `value` under `key`, replacing any previous value. A zero
    /// `ttl` means the entry never expires.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()>;

    /// Fetch a live value.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Keys matching a glob pattern where `*` matches any run of characters.
    async fn scan_keys(&self, pattern: &str) -> StorageResult<Vec<String>>;

    /// Release the backend.
    async fn close(&self) -> StorageResult<()>;

    /// Short backend name for status reporting.
    fn name(&self) -> &'static str;
}

/// Pick the storage backend for this process.
///
/// An empty address selects memory without probing. Otherwise Redis is
/// probed; an unreachable default address, or any address when
/// `allow_in_memory` is set, degrades to memory with a warning. An
/// unreachable explicitly configured address is fatal.
pub async fn connect_storage(config: &ServerConfig) -> StorageResult<Arc<dyn Storage>> {
    if config.redis_addr.is_empty() {
        info!("no redis address configured, using in-memory storage");
        return Ok(Arc::new(MemoryStorage::new()));
    }

    match RedisStorage::connect(&config.redis_url()).await {
        Ok(redis) => {
            info!(addr = %config.redis_addr, db = config.redis_db, "connected to redis");
            Ok(Arc::new(redis))
        }
        Err(err) if config.uses_default_redis() || config.allow_in_memory => {
            warn!(
                addr = %config.redis_addr,
                error = %err,
                "redis unavailable, falling back to in-memory storage; tasks will not survive a restart"
            );
            Ok(Arc::new(MemoryStorage::new()))
        }
        Err(err) => Err(StorageError::Unavailable {
            addr: config.redis_addr.clone(),
            reason: err.to_string(),
        }),
    }
}

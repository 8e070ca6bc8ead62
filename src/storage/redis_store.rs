//! Redis storage backend.
//!
//! Uses `redis::aio::ConnectionManager` so a dropped connection is
//! re-established transparently after startup.

use super::Storage;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SCAN_BATCH: usize = 100;

#[derive(Clone)]
pub struct RedisStorage {
    connection_manager: ConnectionManager,
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisStorage {
    /// Connect and verify the server answers `PING`, giving up after a
    /// few seconds.
    pub async fn connect(url: &str) -> StorageResult<Self> {
        tokio::time::timeout(CONNECT_TIMEOUT, Self::connect_inner(url))
            .await
            .map_err(|_| StorageError::Backend("timed out connecting to redis".to_string()))?
    }

    async fn connect_inner(url: &str) -> StorageResult<Self> {
        let client = redis::Client::open(url)?;

        // One direct attempt first: the manager retries with backoff, which
        // would only delay the verdict on a dead address.
        let mut probe = client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut probe).await?;
        if pong != "PONG" {
            return Err(StorageError::Backend(format!(
                "unexpected PING reply: {pong}"
            )));
        }

        let connection_manager = ConnectionManager::new(client).await?;
        debug!(url = %redact_url(url), "redis storage connected");
        Ok(Self { connection_manager })
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        let mut conn = self.connection_manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if !ttl.is_zero() {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn scan_keys(&self, pattern: &str) -> StorageResult<Vec<String>> {
        let mut conn = self.connection_manager.clone();
        let mut found = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            found.extend(keys);

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may hand out a key more than once.
        found.sort();
        found.dedup();
        Ok(found)
    }

    async fn close(&self) -> StorageResult<()> {
        // The manager closes its connection when the last clone is dropped.
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Redact the password from a Redis URL for logging.
fn redact_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            return format!("{}***{}", &url[..=colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}

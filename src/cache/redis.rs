//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::sync::OnceCell;
use tracing::info;

use super::{CacheEntry, CacheError, CacheStore};

/// Cache store shared through Redis.
///
/// Entries are written with `SETEX` as JSON text, so expiry is Redis's job.
/// The connection is opened on first use and then kept by a
/// [`ConnectionManager`], which reconnects on its own; an unreachable server
/// therefore shows up as a per-call [`CacheError::Backend`] rather than a
/// startup failure. No call is retried here.
///
/// # Examples
///
/// ```no_run
/// use parkhero::cache::RedisStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RedisStore::open("redis://127.0.0.1/")?;
/// # Ok(())
/// # }
/// ```
pub struct RedisStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Validates `redis_url` without connecting.
    pub fn open(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                // One reconnect attempt keeps a dead server from stalling the request.
                let config = ConnectionManagerConfig::new().set_number_of_retries(1);
                let manager =
                    ConnectionManager::new_with_config(self.client.clone(), config).await?;
                info!("connected to redis");
                Ok::<_, CacheError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, entry: &CacheEntry, ttl: Duration) -> Result<(), CacheError> {
        let json = serde_json::to_string(entry)?;
        // SETEX rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);

        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, json, seconds).await?;
        Ok(())
    }
}

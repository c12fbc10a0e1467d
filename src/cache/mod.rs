//! TTL-bounded storage for the garage snapshot.
//!
//! [`CacheStore`] is the single capability the request path depends on. Two
//! implementations exist and one is chosen at startup by [`open_store`]:
//!
//! - [`RedisStore`] when a Redis URL is configured; expiry is delegated to Redis.
//! - [`LocalStore`] otherwise; an in-process map with lazy expiry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::fingerprint;
use crate::garages::Snapshot;

mod clock;
mod local;
mod redis;

pub use clock::{Clock, ManualClock, SystemClock};
pub use local::LocalStore;
pub use self::redis::RedisStore;

/// Errors raised by a cache store. Plain absence is never an error.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] ::redis::RedisError),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache TTL {0:?} is out of range")]
    TtlOutOfRange(Duration),
}

/// A snapshot together with its ETag.
///
/// The only constructor computes the ETag from the body, so a stored entry's
/// `etag` always fingerprints its `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    etag: String,
    body: Snapshot,
}

impl CacheEntry {
    /// Fingerprints `body` and pairs it with the result.
    pub fn new(body: Snapshot) -> Result<Self, serde_json::Error> {
        let etag = fingerprint(&body)?;
        Ok(Self { etag, body })
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn body(&self) -> &Snapshot {
        &self.body
    }
}

/// Key-value storage with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the entry under `key` if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Stores `entry` under `key`, unreadable after `ttl`.
    async fn set(&self, key: &str, entry: &CacheEntry, ttl: Duration) -> Result<(), CacheError>;
}

/// Picks the backend once, at startup: Redis when `redis_url` is given,
/// the in-process store otherwise.
pub fn open_store(redis_url: Option<&str>) -> Result<Arc<dyn CacheStore>, CacheError> {
    match redis_url {
        Some(url) => {
            tracing::info!("using redis cache store");
            Ok(Arc::new(RedisStore::open(url)?))
        }
        None => {
            tracing::info!("REDIS_URL not set, using in-process cache store");
            Ok(Arc::new(LocalStore::new()))
        }
    }
}

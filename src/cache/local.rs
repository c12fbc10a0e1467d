//! In-process cache store with lazy expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{CacheEntry, CacheError, CacheStore, Clock, SystemClock};

struct Slot {
    /// JSON text of the stored [`CacheEntry`].
    value: String,
    expires_at: Instant,
}

/// Cache store kept in process memory.
///
/// Values are stored serialized, exactly as the shared store would hold
/// them. Expiry is checked against the injected [`Clock`] on every read, and
/// an expired slot is evicted when it is found; nothing sweeps in the
/// background.
pub struct LocalStore {
    slots: Mutex<HashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
}

impl LocalStore {
    /// A store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// A store driven by `clock`, typically a
    /// [`ManualClock`](super::ManualClock) in tests.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of slots currently held, expired-but-unread ones included.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for LocalStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let value = {
            let mut slots = self.slots.lock().await;
            let Some(slot) = slots.get(key) else {
                return Ok(None);
            };
            if self.clock.now() >= slot.expires_at {
                slots.remove(key);
                debug!(key, "local cache entry expired, evicted");
                return Ok(None);
            }
            slot.value.clone()
        };

        Ok(Some(serde_json::from_str(&value)?))
    }

    async fn set(&self, key: &str, entry: &CacheEntry, ttl: Duration) -> Result<(), CacheError> {
        let value = serde_json::to_string(entry)?;
        let expires_at = self
            .clock
            .now()
            .checked_add(ttl)
            .ok_or(CacheError::TtlOutOfRange(ttl))?;

        self.slots
            .lock()
            .await
            .insert(key.to_owned(), Slot { value, expires_at });
        Ok(())
    }
}

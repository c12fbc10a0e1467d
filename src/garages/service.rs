//! Cache-first retrieval of the garage snapshot.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use super::model::{Snapshot, demo_snapshot, normalize};
use crate::cache::{CacheEntry, CacheError, CacheStore};
use crate::upstream::{Upstream, UpstreamError};

/// The one key the snapshot lives under.
pub const CACHE_KEY: &str = "garages:v1";

/// Why a snapshot could not be produced.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("failed to fingerprint snapshot: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// What [`SnapshotService::snapshot`] found.
#[derive(Debug)]
pub enum SnapshotOutcome {
    /// Cached, and the client already holds this version.
    NotModified { etag: String },
    /// Served from the cache store.
    Hit(CacheEntry),
    /// Freshly built and written to the cache store.
    Miss(CacheEntry),
}

/// Looks the snapshot up in the cache store and rebuilds it on a miss.
///
/// Holds no state of its own between calls. Concurrent misses each rebuild
/// and each write; the writes are equivalent up to freshness.
pub struct SnapshotService {
    store: Arc<dyn CacheStore>,
    upstream: Option<Arc<dyn Upstream>>,
    ttl: Duration,
}

impl SnapshotService {
    /// `upstream: None` serves the built-in demo data set.
    pub fn new(store: Arc<dyn CacheStore>, upstream: Option<Arc<dyn Upstream>>, ttl: Duration) -> Self {
        Self { store, upstream, ttl }
    }

    /// Resolves the current snapshot.
    ///
    /// `if_none_match` is compared byte-for-byte against a cached ETag; a
    /// freshly built snapshot is always returned in full. Nothing is written
    /// to the cache store unless the whole rebuild succeeded.
    pub async fn snapshot(&self, if_none_match: Option<&str>) -> Result<SnapshotOutcome, SnapshotError> {
        if let Some(entry) = self.store.get(CACHE_KEY).await? {
            if if_none_match == Some(entry.etag()) {
                return Ok(SnapshotOutcome::NotModified {
                    etag: entry.etag().to_owned(),
                });
            }
            return Ok(SnapshotOutcome::Hit(entry));
        }

        let snapshot = self.rebuild().await?;
        let entry = CacheEntry::new(snapshot)?;
        self.store.set(CACHE_KEY, &entry, self.ttl).await?;

        debug!(
            etag = entry.etag(),
            garages = entry.body().garages().len(),
            ttl_secs = self.ttl.as_secs(),
            "snapshot cached"
        );
        Ok(SnapshotOutcome::Miss(entry))
    }

    async fn rebuild(&self) -> Result<Snapshot, UpstreamError> {
        match &self.upstream {
            Some(upstream) => Ok(normalize(upstream.fetch().await?)),
            None => {
                info!("no upstream configured, serving demo snapshot");
                Ok(demo_snapshot())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalStore;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        body: Option<Value>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Upstream for Scripted {
        async fn fetch(&self) -> Result<Value, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body
                .clone()
                .ok_or(UpstreamError::Status { status: 503 })
        }
    }

    fn service(body: Option<Value>) -> (Arc<Scripted>, Arc<LocalStore>, SnapshotService) {
        let upstream = Arc::new(Scripted {
            body,
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(LocalStore::new());
        let service = SnapshotService::new(store.clone(), Some(upstream.clone() as Arc<dyn Upstream>), Duration::from_secs(60));
        (upstream, store, service)
    }

    #[tokio::test]
    async fn miss_then_hit_calls_upstream_once() {
        let (upstream, _store, service) = service(Some(json!([{ "id": "a" }])));

        let SnapshotOutcome::Miss(first) = service.snapshot(None).await.unwrap() else {
            panic!("expected a miss");
        };
        let SnapshotOutcome::Hit(second) = service.snapshot(None).await.unwrap() else {
            panic!("expected a hit");
        };
        assert_eq!(first, second);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn matching_validator_on_hit_is_not_modified() {
        let (_upstream, _store, service) = service(Some(json!([])));
        let SnapshotOutcome::Miss(entry) = service.snapshot(None).await.unwrap() else {
            panic!("expected a miss");
        };

        match service.snapshot(Some(entry.etag())).await.unwrap() {
            SnapshotOutcome::NotModified { etag } => assert_eq!(etag, entry.etag()),
            other => panic!("expected NotModified, got {other:?}"),
        }
        assert!(matches!(
            service.snapshot(Some("stale")).await.unwrap(),
            SnapshotOutcome::Hit(_)
        ));
    }

    #[tokio::test]
    async fn upstream_failure_writes_nothing() {
        let (_upstream, store, service) = service(None);
        assert!(matches!(
            service.snapshot(None).await,
            Err(SnapshotError::Upstream(UpstreamError::Status { status: 503 }))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn no_upstream_serves_and_caches_demo() {
        let store = Arc::new(LocalStore::new());
        let service = SnapshotService::new(store.clone(), None, Duration::from_secs(60));

        let SnapshotOutcome::Miss(entry) = service.snapshot(None).await.unwrap() else {
            panic!("expected a miss");
        };
        assert_eq!(entry.body().garages().len(), 4);
        assert_eq!(store.get(CACHE_KEY).await.unwrap(), Some(entry));
    }
}

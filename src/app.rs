//! Application assembly: backends, routes, and middleware.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::cache::{CacheError, open_store};
use crate::config::Config;
use crate::garages::{SnapshotService, get_garages};
use crate::middleware::{LoggerMiddleware, Pipeline};
use crate::security::{CorsMiddleware, SecureHeadersMiddleware};
use crate::upstream::{HttpUpstream, Upstream, UpstreamError};
use crate::{Request, Response, Router, StatusCode};

/// Startup failures.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

#[derive(Serialize)]
struct Health {
    ok: bool,
    uptime: f64,
}

/// The whole HTTP application: `GET /health` and `GET /api/garages` behind
/// the logging, secure-header, and CORS layers.
pub struct App {
    pipeline: Pipeline,
}

impl App {
    /// Wires the backends named by `config`. The cache backend is chosen
    /// here, once.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let store = open_store(config.redis_url())?;

        let upstream = match config.upstream_url() {
            Some(url) => {
                info!(url, retries = config.retries, "using upstream");
                let upstream = HttpUpstream::new(
                    url,
                    config.upstream_auth().map(str::to_owned),
                    config.retry_policy(),
                    config.upstream_timeout(),
                )?;
                Some(Arc::new(upstream) as Arc<dyn Upstream>)
            }
            None => {
                info!("UPSTREAM_URL not set, serving demo data");
                None
            }
        };

        let service = SnapshotService::new(store, upstream, config.cache_ttl());
        Ok(Self::new(service, &config.cors_origin))
    }

    /// Builds the routes around an already-constructed service.
    pub fn new(service: SnapshotService, cors_origins: &str) -> Self {
        let service = Arc::new(service);
        let started = Instant::now();

        let mut router = Router::new();
        router.get("/health", move |_req: Request| async move {
            Response::json(
                StatusCode::Ok,
                &Health {
                    ok: true,
                    uptime: started.elapsed().as_secs_f64(),
                },
            )
        });
        router.get("/api/garages", move |req: Request| {
            let service = Arc::clone(&service);
            async move { get_garages(&service, req).await }
        });

        let pipeline = Pipeline::new(router)
            .layer(LoggerMiddleware)
            .layer(SecureHeadersMiddleware)
            .layer(CorsMiddleware::from_origin_list(cors_origins));

        Self { pipeline }
    }

    /// Handles one request.
    pub async fn handle(&self, request: Request) -> Response {
        self.pipeline.handle(request).await
    }
}

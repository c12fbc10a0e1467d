//! # parkhero
//!
//! A caching HTTP proxy for parking-garage availability.
//!
//! `GET /api/garages` serves one snapshot of garage availability. The
//! snapshot is fetched from a configured upstream (or built from demo data),
//! fingerprinted into an ETag, and kept in a TTL cache (Redis, or an
//! in-process map), so repeat requests are answered from the cache and
//! `If-None-Match` revalidations get `304 Not Modified`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parkhero::{App, Server, cache::LocalStore, garages::SnapshotService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = SnapshotService::new(
//!         Arc::new(LocalStore::new()),
//!         None,
//!         std::time::Duration::from_secs(60),
//!     );
//!     let app = Arc::new(App::new(service, "*"));
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server.run(move |req| {
//!         let app = Arc::clone(&app);
//!         async move { app.handle(req).await }
//!     }).await?;
//!     Ok(())
//! }
//! ```

// ── Wire-level plumbing ───────────────────────────────────────────────────────
pub mod http;
pub mod middleware;
pub mod router;
pub mod security;
pub mod server;

// ── Garage snapshot pipeline ──────────────────────────────────────────────────
pub mod cache;
pub mod fingerprint;
pub mod garages;
pub mod upstream;

// ── Process wiring ────────────────────────────────────────────────────────────
pub mod app;
pub mod config;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::{App, AppError};
pub use config::Config;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};

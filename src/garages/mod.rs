//! The garage-availability resource: data model, cache-first service, and
//! its HTTP handler.

mod handler;
mod model;
mod service;

pub use handler::get_garages;
pub use model::{DEMO_GARAGES, Garage, Snapshot, demo_snapshot, normalize, normalize_at, timestamp};
pub use service::{CACHE_KEY, SnapshotError, SnapshotOutcome, SnapshotService};

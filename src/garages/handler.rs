//! `GET /api/garages`.

use serde::Serialize;
use tracing::error;

use super::service::{SnapshotOutcome, SnapshotService};
use crate::http::headers::names;
use crate::{Request, Response, StatusCode};

/// Body sent with every `502`.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: &'static str,
    detail: String,
}

/// Maps a [`SnapshotService`] result onto HTTP.
///
/// | Outcome       | Status | `X-Cache` | Body            |
/// |---------------|--------|-----------|-----------------|
/// | `NotModified` | 304    | `HIT`     | empty           |
/// | `Hit`         | 200    | `HIT`     | cached snapshot |
/// | `Miss`        | 200    | `MISS`    | fresh snapshot  |
/// | error         | 502    | none      | error envelope  |
pub async fn get_garages(service: &SnapshotService, request: Request) -> Response {
    match service.snapshot(request.if_none_match()).await {
        Ok(SnapshotOutcome::NotModified { etag }) => Response::new(StatusCode::NotModified)
            .header(names::X_CACHE, "HIT")
            .header(names::ETAG, etag),
        Ok(SnapshotOutcome::Hit(entry)) => Response::json(StatusCode::Ok, entry.body())
            .header(names::X_CACHE, "HIT")
            .header(names::ETAG, entry.etag()),
        Ok(SnapshotOutcome::Miss(entry)) => Response::json(StatusCode::Ok, entry.body())
            .header(names::X_CACHE, "MISS")
            .header(names::ETAG, entry.etag()),
        Err(e) => {
            error!(error = %e, path = request.path(), "garages failed");
            Response::json(
                StatusCode::BadGateway,
                &ErrorEnvelope {
                    error: "Upstream error",
                    detail: e.to_string(),
                },
            )
        }
    }
}

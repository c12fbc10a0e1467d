//! Security middleware — CORS and secure-default response headers.

mod middleware;

pub use middleware::{CorsMiddleware, SecureHeadersMiddleware};

//! Security middleware implementations.
//!
//! - [`CorsMiddleware`] — Cross-Origin Resource Sharing header injection and
//!   preflight (`OPTIONS`) short-circuiting, driven by the configured origins.
//! - [`SecureHeadersMiddleware`] — conservative browser-hardening headers on
//!   every response.

use std::pin::Pin;
use std::sync::Arc;

use crate::{
    Method, Request, Response, StatusCode,
    http::headers::names,
    middleware::{Middleware, Next},
};

/// CORS middleware — validates the `Origin` header, handles preflight requests,
/// and injects `Access-Control-*` headers on actual responses.
///
/// # Behavior
///
/// - If no `Origin` header is present the request passes through unmodified.
/// - If the origin is not in the allow-list the request passes through unmodified
///   (the browser then blocks the response).
/// - `OPTIONS` preflight requests are short-circuited with `204 No Content` and the
///   appropriate `Access-Control-*` headers; the downstream handler is **not** called.
/// - For all other requests the handler runs normally and the CORS headers are appended
///   to the response. `ETag` and `X-Cache` are exposed so browser clients can
///   issue conditional requests.
/// - `Vary: Origin` is added whenever a specific origin is echoed back.
///
/// # Examples
///
/// ```rust
/// use parkhero::security::CorsMiddleware;
///
/// let any = CorsMiddleware::from_origin_list("*");
/// let some = CorsMiddleware::from_origin_list("https://a.example, https://b.example");
/// ```
pub struct CorsMiddleware {
    policy: Arc<CorsPolicy>,
}

struct CorsPolicy {
    any_origin: bool,
    allowed_origins: Vec<String>,
    allowed_methods: String,
    allowed_headers: String,
    exposed_headers: String,
}

impl CorsMiddleware {
    /// Builds the middleware from a comma-separated origin list.
    ///
    /// Entries are trimmed and empty entries ignored. A `*` entry anywhere in
    /// the list allows every origin.
    pub fn from_origin_list(origins: &str) -> Self {
        let allowed_origins: Vec<String> = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_owned)
            .collect();
        let any_origin = allowed_origins.iter().any(|o| o == "*");

        Self {
            policy: Arc::new(CorsPolicy {
                any_origin,
                allowed_origins,
                allowed_methods: "GET, HEAD, OPTIONS".to_owned(),
                allowed_headers: [names::CONTENT_TYPE, names::AUTHORIZATION, names::IF_NONE_MATCH]
                    .join(", "),
                exposed_headers: [names::ETAG, names::X_CACHE].join(", "),
            }),
        }
    }

    /// Returns `true` if requests from `origin` may read responses.
    pub fn allows(&self, origin: &str) -> bool {
        self.policy.any_origin || self.policy.allowed_origins.iter().any(|o| o == origin)
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, request: Request, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let policy = Arc::clone(&self.policy);
        let allowed = request
            .headers()
            .get(names::ORIGIN)
            .filter(|origin| self.allows(origin))
            .map(str::to_owned);

        Box::pin(async move {
            let Some(origin) = allowed else {
                return next.run(request).await;
            };

            let allow_origin = if policy.any_origin { "*".to_owned() } else { origin };
            let is_wildcard = policy.any_origin;

            if request.method() == &Method::Options {
                let mut resp = Response::new(StatusCode::NoContent)
                    .header("Access-Control-Allow-Origin", &allow_origin)
                    .header("Access-Control-Allow-Methods", &policy.allowed_methods)
                    .header("Access-Control-Allow-Headers", &policy.allowed_headers)
                    .header("Access-Control-Max-Age", "3600");
                if !is_wildcard {
                    resp.add_header(names::VARY, names::ORIGIN);
                }
                return resp;
            }

            let mut resp = next.run(request).await;
            resp.add_header("Access-Control-Allow-Origin", &allow_origin);
            resp.add_header("Access-Control-Expose-Headers", &policy.exposed_headers);
            if !is_wildcard {
                resp.add_header(names::VARY, names::ORIGIN);
            }
            resp
        })
    }
}

/// Adds browser-hardening headers to every response.
///
/// | Header                        | Value                                  |
/// |-------------------------------|----------------------------------------|
/// | `X-Content-Type-Options`      | `nosniff`                              |
/// | `X-Frame-Options`             | `SAMEORIGIN`                           |
/// | `Referrer-Policy`             | `no-referrer`                          |
/// | `X-DNS-Prefetch-Control`      | `off`                                  |
/// | `Strict-Transport-Security`   | `max-age=15552000; includeSubDomains`  |
/// | `Cross-Origin-Opener-Policy`  | `same-origin`                          |
pub struct SecureHeadersMiddleware;

const SECURE_HEADERS: [(&str, &str); 6] = [
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "SAMEORIGIN"),
    ("Referrer-Policy", "no-referrer"),
    ("X-DNS-Prefetch-Control", "off"),
    ("Strict-Transport-Security", "max-age=15552000; includeSubDomains"),
    ("Cross-Origin-Opener-Policy", "same-origin"),
];

impl Middleware for SecureHeadersMiddleware {
    fn handle(&self, request: Request, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let mut resp = next.run(request).await;
            for (name, value) in SECURE_HEADERS {
                resp.add_header(name, value);
            }
            resp
        })
    }
}

//! Exact-path routing for the proxy's fixed endpoints.
//!
//! A trailing slash is ignored on both the registered pattern and the request
//! path, so `/health/` reaches `/health`. Routes are tried in registration
//! order and the first whose method and path match handles the request.
//! `HEAD` is served by the matching `GET` route with the body left off.
//! Everything else gets `404 Not Found`.

use std::pin::Pin;
use std::sync::Arc;

use crate::{Method, Request, Response, StatusCode};

/// Future returned by a type-erased handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A stored, type-erased handler.
pub type Handler = Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>;

/// Anything that can serve a route: an `async` closure or function taking a
/// [`Request`] and producing a [`Response`].
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, request: Request) -> HandlerFuture;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request) -> HandlerFuture {
        Box::pin(self(request))
    }
}

fn normalize(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// ```rust,no_run
/// use parkhero::{Request, Response, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/health", |_req: Request| async { Response::new(StatusCode::Ok) });
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `GET path` with `handler`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.routes.push(Route {
            method: Method::Get,
            path: normalize(path).to_owned(),
            handler: Arc::new(move |request| handler.call(request)),
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub async fn route(&self, request: Request) -> Response {
        let head = *request.method() == Method::Head;
        let method = if head { &Method::Get } else { request.method() };
        let path = normalize(request.path());
        let handler = self
            .routes
            .iter()
            .find(|route| route.method == *method && route.path == path)
            .map(|route| Arc::clone(&route.handler));

        let response = match handler {
            Some(handler) => handler(request).await,
            None => Response::new(StatusCode::NotFound).body("Not Found"),
        };
        if head { response.head_only() } else { response }
    }
}

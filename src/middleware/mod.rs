//! Middleware pipeline — composable before/after request handler logic.
//!
//! Each middleware wraps the next layer, enabling request inspection,
//! short-circuit responses, and response decoration without coupling the
//! route handlers to infrastructure concerns.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer. Once the chain is exhausted the request is
//!   handed to the [`Router`].
//! - [`Pipeline`] — an ordered middleware stack terminated by a router.
//! - [`LoggerMiddleware`] — built-in request/response logger.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Request, Response, router::Router};

/// A type-erased, reference-counted middleware.
pub type MiddlewareHandler = Arc<dyn Middleware>;

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
///
/// # Examples
///
/// ```rust,no_run
/// use std::pin::Pin;
/// use parkhero::{Request, Response, middleware::{Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(
///         &self,
///         request: Request,
///         next: Next,
///     ) -> Pin<Box<dyn std::future::Future<Output = Response> + Send>> {
///         Box::pin(async move { next.run(request).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    endpoint: Arc<Router>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

impl Next {
    /// Invokes the next middleware in the chain, or the router once every
    /// middleware has run, and returns its response.
    pub async fn run(mut self, request: Request) -> Response {
        match self.middlewares.get(self.index).cloned() {
            Some(middleware) => {
                self.index += 1;
                middleware.handle(request, self).await
            }
            None => self.endpoint.route(request).await,
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Request`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(request).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(request).await`, inspect the response, and
///   return a modified copy.
///
/// Implementations must be `Send + Sync` because middleware is shared across
/// Tokio tasks, and must return a pinned `Send` future.
pub trait Middleware: Send + Sync + 'static {
    /// Handle the request and optionally delegate to the next layer.
    fn handle(&self, request: Request, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// An ordered middleware stack in front of a [`Router`].
///
/// Middleware runs in the order it was added: the first layer added sees the
/// request first and the response last.
///
/// # Examples
///
/// ```rust,no_run
/// use parkhero::{Router, middleware::{LoggerMiddleware, Pipeline}};
///
/// let pipeline = Pipeline::new(Router::new()).layer(LoggerMiddleware);
/// ```
pub struct Pipeline {
    middlewares: Arc<[MiddlewareHandler]>,
    endpoint: Arc<Router>,
}

impl Pipeline {
    /// Creates a pipeline with no middleware that dispatches straight to `router`.
    pub fn new(router: Router) -> Self {
        Self {
            middlewares: Arc::from(Vec::new()),
            endpoint: Arc::new(router),
        }
    }

    /// Appends a middleware layer.
    #[must_use]
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        let mut middlewares = self.middlewares.to_vec();
        middlewares.push(Arc::new(middleware));
        self.middlewares = Arc::from(middlewares);
        self
    }

    /// Runs `request` through every layer and the router.
    pub async fn handle(&self, request: Request) -> Response {
        let next = Next {
            middlewares: Arc::clone(&self.middlewares),
            endpoint: Arc::clone(&self.endpoint),
            index: 0,
        };
        next.run(request).await
    }
}

/// Built-in middleware that logs each request's method, path, status, and duration.
///
/// Emits a single `tracing::info!` event after the downstream handler
/// completes; `5xx` responses are logged at `warn`.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, request: Request, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = request.method().as_str().to_owned();
            let path = request.path().to_owned();

            let response = next.run(request).await;

            let duration = start.elapsed();
            let status = response.status().as_u16();

            if status >= 500 {
                tracing::warn!(%method, %path, status, ?duration, "request completed");
            } else {
                tracing::info!(%method, %path, status, ?duration, "request completed");
            }

            response
        })
    }
}

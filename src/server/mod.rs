//! TCP front end: the accept loop and HTTP/1.1 framing per connection.
//!
//! Each accepted socket gets its own task. A connection serves requests one
//! after another (pipelined requests already buffered included) until the
//! peer hangs up, a request asks to close, or a request cannot be framed.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listener I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Largest request (head plus declared body) accepted, 200 KiB.
const MAX_REQUEST_SIZE: usize = 200 * 1024;

const READ_CHUNK: usize = 4 * 1024;

/// A bound listener waiting for a handler.
///
/// ```rust,no_run
/// use parkhero::server::Server;
/// use parkhero::http::{Request, Response, StatusCode};
///
/// # async fn example() -> Result<(), parkhero::ServerError> {
/// let server = Server::bind("127.0.0.1:8080").await?;
/// server
///     .run(|req: Request| async move { Response::new(StatusCode::Ok).body(req.path().to_owned()) })
///     .await
/// # }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds `addr` (`host:port`). Port `0` picks a free port; see
    /// [`local_addr`](Self::local_addr).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_owned(),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        Ok(Self { listener, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves forever.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.run_until_shutdown(handler, std::future::pending()).await
    }

    /// Serves until `shutdown` resolves, then stops accepting.
    ///
    /// Connections already handed to a task are not interrupted; they end on
    /// their own.
    pub async fn run_until_shutdown<H, F, S>(self, handler: H, shutdown: S) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
        S: Future<Output = ()> + Send,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "listening");

        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                },
                () = &mut shutdown => {
                    info!("shutting down, no longer accepting connections");
                    return Ok(());
                }
            };

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                debug!(%peer, "connection opened");
                if let Err(e) = serve_connection(stream, peer, handler).await {
                    warn!(%peer, error = %e, "connection dropped");
                }
            });
        }
    }
}

/// What the front of a connection buffer holds.
enum Framed {
    /// A whole request and how many buffered bytes it spans.
    Complete(Request, usize),
    NeedMore,
    /// The request cannot be served; reply and close.
    Reject(Response),
}

fn frame(buf: &[u8]) -> Framed {
    match Request::parse(buf) {
        Ok((request, head_len)) => {
            let span = head_len.saturating_add(request.content_length().unwrap_or(0));
            if span > MAX_REQUEST_SIZE {
                Framed::Reject(too_large())
            } else if buf.len() < span {
                Framed::NeedMore
            } else {
                Framed::Complete(request, span)
            }
        }
        Err(RequestError::Incomplete) if buf.len() > MAX_REQUEST_SIZE => Framed::Reject(too_large()),
        Err(RequestError::Incomplete) => Framed::NeedMore,
        Err(e) => Framed::Reject(Response::new(StatusCode::BadRequest).body(format!("Bad Request: {e}"))),
    }
}

fn too_large() -> Response {
    Response::new(StatusCode::PayloadTooLarge).body("Request entity too large")
}

async fn serve_connection<H, F>(mut stream: TcpStream, peer: SocketAddr, handler: Arc<H>) -> std::io::Result<()>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        let (request, span) = match frame(&buf) {
            Framed::Complete(request, span) => (request, span),
            Framed::NeedMore => {
                if stream.read_buf(&mut buf).await? == 0 {
                    if !buf.is_empty() {
                        debug!(%peer, buffered = buf.len(), "peer closed mid-request");
                    }
                    return Ok(());
                }
                continue;
            }
            Framed::Reject(response) => {
                warn!(%peer, status = response.status().as_u16(), "rejecting request");
                stream.write_all(&response.keep_alive(false).into_bytes()).await?;
                return Ok(());
            }
        };
        // Request bodies are ignored.
        buf.advance(span);

        let keep_alive = request.is_keep_alive();
        debug!(%peer, method = %request.method(), path = request.path(), "dispatching");

        let response = handler(request).await.keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;

        if !keep_alive {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn_echo_path() -> SocketAddr {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        tokio::spawn(server.run(|req: Request| async move {
            Response::new(StatusCode::Ok).body(req.path().to_owned())
        }));
        addr
    }

    async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn connection_close_is_honoured() {
        let addr = spawn_echo_path().await;
        let text = exchange(addr, b"GET /health HTTP/1.1\r\nConnection: close\r\n\r\n").await;
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("/health"));
    }

    #[tokio::test]
    async fn pipelined_requests_are_answered_in_order() {
        let addr = spawn_echo_path().await;
        let text = exchange(
            addr,
            b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert_eq!(text.matches("HTTP/1.1 200 OK").count(), 2);
        let a = text.find("\r\n\r\n/a").unwrap();
        let b = text.find("\r\n\r\n/b").unwrap();
        assert!(a < b);
    }

    #[tokio::test]
    async fn request_body_is_skipped() {
        let addr = spawn_echo_path().await;
        let text = exchange(
            addr,
            b"GET /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nxyzGET /b HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert_eq!(text.matches("HTTP/1.1 200 OK").count(), 2);
        assert!(text.ends_with("/b"));
    }

    #[tokio::test]
    async fn malformed_request_gets_400() {
        let addr = spawn_echo_path().await;
        let text = exchange(addr, b"\x01 nonsense\r\n\r\n").await;
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(text.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn oversized_declared_body_gets_413() {
        let addr = spawn_echo_path().await;
        let text = exchange(addr, b"GET /a HTTP/1.1\r\nContent-Length: 10000000\r\n\r\n").await;
        assert!(text.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn shutdown_future_stops_the_accept_loop() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let result = server
            .run_until_shutdown(|_req: Request| async { Response::new(StatusCode::Ok) }, async {})
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn binding_a_taken_port_fails() {
        let first = Server::bind("127.0.0.1:0").await.unwrap();
        let err = Server::bind(first.local_addr().to_string()).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}

//! `HttpUpstream` against a real socket, served by the crate's own server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use parkhero::cache::LocalStore;
use parkhero::garages::SnapshotService;
use parkhero::upstream::{HttpUpstream, RetryPolicy, Upstream, UpstreamError};
use parkhero::{App, Request, Response, Server, StatusCode};
use serde_json::Value;

const GARAGES: &str = r#"[{"id":"a","name":"A","lat":44.8,"lng":20.4,"capacity":10,"free":4,"address":"A 1","type":"garage"}]"#;

/// A fake upstream that fails `failures` times with a 500, then serves `body`.
struct FakeUpstream {
    addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    auth: Arc<Mutex<Option<String>>>,
}

impl FakeUpstream {
    async fn spawn(failures: usize, body: &'static str) -> Self {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let calls = Arc::new(AtomicUsize::new(0));
        let auth = Arc::new(Mutex::new(None));

        let seen_calls = Arc::clone(&calls);
        let seen_auth = Arc::clone(&auth);
        tokio::spawn(server.run(move |req: Request| {
            let n = seen_calls.fetch_add(1, Ordering::SeqCst);
            *seen_auth.lock().unwrap() = req.headers().get("authorization").map(str::to_owned);
            async move {
                if n < failures {
                    Response::new(StatusCode::InternalServerError).body("down")
                } else {
                    Response::new(StatusCode::Ok)
                        .header("Content-Type", "application/json")
                        .body(body)
                }
            }
        }));

        Self { addr, calls, auth }
    }

    fn url(&self) -> String {
        format!("http://{}/garages", self.addr)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn auth(&self) -> Option<String> {
        self.auth.lock().unwrap().clone()
    }
}

fn client(url: String, auth: Option<&str>, attempts: u32) -> HttpUpstream {
    HttpUpstream::new(
        url,
        auth.map(str::to_owned),
        RetryPolicy::new(attempts, Duration::from_millis(20)),
        Duration::from_secs(2),
    )
    .unwrap()
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let fake = FakeUpstream::spawn(2, GARAGES).await;
    let upstream = client(fake.url(), None, 3);

    let started = Instant::now();
    let raw = upstream.fetch().await.unwrap();

    assert_eq!(raw[0]["id"], "a");
    assert_eq!(fake.calls(), 3);
    // 20ms after the first failure, 40ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn exhausted_retries_report_last_status() {
    let fake = FakeUpstream::spawn(usize::MAX, GARAGES).await;
    let upstream = client(fake.url(), None, 3);

    let err = upstream.fetch().await.unwrap_err();
    assert!(matches!(err, UpstreamError::Status { status: 500 }));
    assert_eq!(fake.calls(), 3);
}

#[tokio::test]
async fn authorization_is_sent_verbatim() {
    let fake = FakeUpstream::spawn(0, GARAGES).await;
    let upstream = client(fake.url(), Some("Token abc123"), 1);

    upstream.fetch().await.unwrap();
    assert_eq!(fake.auth().as_deref(), Some("Token abc123"));
}

#[tokio::test]
async fn no_authorization_header_without_credentials() {
    let fake = FakeUpstream::spawn(0, GARAGES).await;
    client(fake.url(), None, 1).fetch().await.unwrap();
    assert_eq!(fake.auth(), None);
}

#[tokio::test]
async fn non_json_body_is_a_decode_error() {
    let fake = FakeUpstream::spawn(0, "<html>maintenance</html>").await;
    let err = client(fake.url(), None, 2).fetch().await.unwrap_err();

    assert!(matches!(err, UpstreamError::Decode(_)));
    assert_eq!(fake.calls(), 2);
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let err = client(format!("http://{addr}/garages"), None, 1)
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Transport(_)));
}

#[tokio::test]
async fn full_stack_miss_then_hit() {
    let fake = FakeUpstream::spawn(1, GARAGES).await;
    let upstream = Arc::new(client(fake.url(), Some("Bearer t"), 3)) as Arc<dyn Upstream>;
    let service = SnapshotService::new(
        Arc::new(LocalStore::new()),
        Some(upstream),
        Duration::from_secs(60),
    );
    let app = App::new(service, "*");

    let get = || Request::parse(b"GET /api/garages HTTP/1.1\r\n\r\n").unwrap().0;

    let miss = app.handle(get()).await;
    assert_eq!(miss.status(), StatusCode::Ok);
    assert_eq!(miss.headers().get("x-cache"), Some("MISS"));
    let body: Value = serde_json::from_slice(miss.body_ref()).unwrap();
    assert_eq!(body["garages"], serde_json::from_str::<Value>(GARAGES).unwrap());

    let hit = app.handle(get()).await;
    assert_eq!(hit.headers().get("x-cache"), Some("HIT"));
    assert_eq!(hit.headers().get("etag"), miss.headers().get("etag"));
    assert_eq!(fake.calls(), 2);
    assert_eq!(fake.auth().as_deref(), Some("Bearer t"));
}

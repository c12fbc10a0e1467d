//! Outgoing responses and their HTTP/1.1 encoding.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use super::headers::names;
use super::{Headers, StatusCode};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// A response under construction.
///
/// Handlers build one with the chaining methods; middleware decorates it in
/// place with [`add_header`](Self::add_header); the connection loop turns it
/// into wire bytes with [`into_bytes`](Self::into_bytes).
///
/// ```
/// use parkhero::http::{Response, StatusCode};
///
/// let wire = Response::new(StatusCode::Ok)
///     .header("X-Cache", "HIT")
///     .body(r#"{"ok":true}"#)
///     .into_bytes();
///
/// let text = std::str::from_utf8(&wire).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\nX-Cache: HIT\r\n"));
/// assert!(text.ends_with("Content-Length: 11\r\n\r\n{\"ok\":true}"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
    head_only: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
            keep_alive: true,
            head_only: false,
        }
    }

    /// A response carrying `value` as its JSON body.
    ///
    /// If `value` cannot be serialized the result is an empty `500` instead.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(encoded) => Self {
                body: Bytes::from(encoded),
                ..Self::new(status).header(names::CONTENT_TYPE, JSON_CONTENT_TYPE)
            },
            Err(e) => {
                tracing::error!(error = %e, status = status.as_u16(), "response body failed to serialize");
                Self::new(StatusCode::InternalServerError)
            }
        }
    }

    /// Adds a header. Repeated names are kept side by side.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Replaces the body with plain text.
    #[must_use]
    pub fn body(mut self, text: impl Into<String>) -> Self {
        self.body = Bytes::from(text.into());
        self
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Answers a `HEAD`: headers (and `Content-Length`) as for `GET`, no body.
    #[must_use]
    pub fn head_only(mut self) -> Self {
        self.head_only = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    /// Encodes status line, headers, and body.
    ///
    /// `Connection` always reflects [`keep_alive`](Self::keep_alive), replacing
    /// any value a handler set. A non-empty body without a `Content-Type` is
    /// labelled as plain text. `204` and `304` carry neither body nor
    /// `Content-Length`; every other status gets a `Content-Length`. A
    /// [`head_only`](Self::head_only) response keeps that length but sends no
    /// body bytes.
    pub fn into_bytes(mut self) -> BytesMut {
        let bodiless = matches!(self.status, StatusCode::NoContent | StatusCode::NotModified);
        if bodiless {
            self.body.clear();
        } else if !self.body.is_empty() && !self.headers.contains(names::CONTENT_TYPE) {
            self.headers.insert(names::CONTENT_TYPE, TEXT_CONTENT_TYPE);
        }
        self.headers.set(
            names::CONNECTION,
            if self.keep_alive { "keep-alive" } else { "close" },
        );
        if !bodiless {
            self.headers.set(names::CONTENT_LENGTH, self.body.len().to_string());
        }

        let mut wire = BytesMut::with_capacity(64 + self.headers.len() * 48 + self.body.len());
        wire.put_slice(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        for (name, value) in self.headers.iter() {
            wire.put_slice(name.as_bytes());
            wire.put_slice(b": ");
            wire.put_slice(value.as_bytes());
            wire.put_slice(b"\r\n");
        }
        wire.put_slice(b"\r\n");
        if !self.head_only {
            wire.put_slice(&self.body);
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(response: Response) -> String {
        String::from_utf8(response.into_bytes().to_vec()).unwrap()
    }

    #[test]
    fn text_body_is_framed() {
        let s = wire(Response::new(StatusCode::Ok).body("Hello"));
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn json_body_sets_content_type() {
        let r = Response::json(StatusCode::BadGateway, &serde_json::json!({ "error": "x" }));
        assert_eq!(r.headers().get("content-type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(r.body_ref(), br#"{"error":"x"}"#);
        let s = wire(r);
        assert!(s.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
        assert_eq!(s.matches("Content-Type").count(), 1);
    }

    #[test]
    fn not_modified_is_headers_only() {
        let s = wire(Response::new(StatusCode::NotModified).header(names::ETAG, "abc"));
        assert!(s.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(s.contains("ETag: abc\r\n"));
        assert!(!s.contains("Content-Type"));
        assert!(!s.contains("Content-Length"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn empty_ok_still_declares_length() {
        let s = wire(Response::new(StatusCode::Ok));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn head_only_keeps_length_drops_body() {
        let s = wire(Response::new(StatusCode::Ok).body("Hello").head_only());
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\n"));
        assert!(!s.contains("Hello"));
    }

    #[test]
    fn connection_header_follows_keep_alive() {
        let s = wire(
            Response::new(StatusCode::Ok)
                .header("Connection", "keep-alive")
                .keep_alive(false),
        );
        assert!(s.contains("Connection: close\r\n"));
        assert!(!s.contains("keep-alive"));
    }
}

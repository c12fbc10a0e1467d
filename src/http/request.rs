//! Request-head parsing on top of [`httparse`].
//!
//! The proxy never reads request bodies. [`Request::parse`] reports where the
//! head ends and [`Request::content_length`] says how many body bytes follow,
//! so the connection loop can skip over them.

use thiserror::Error;

use super::headers::names;
use super::{Headers, Method};

/// Upper bound on header lines per request.
const MAX_HEADERS: usize = 64;

#[derive(Debug, Error)]
pub enum RequestError {
    /// The buffer ends before the blank line that closes the head.
    #[error("incomplete request head")]
    Incomplete,

    #[error("malformed request: {0}")]
    Parse(#[from] httparse::Error),

    #[error("request line has no {0}")]
    MissingField(&'static str),
}

/// The head of one HTTP/1.x request.
///
/// ```
/// use parkhero::http::request::Request;
///
/// let raw = b"GET /api/garages HTTP/1.1\r\nHost: localhost\r\nIf-None-Match: abc\r\n\r\n";
/// let (request, head_len) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.path(), "/api/garages");
/// assert_eq!(request.if_none_match(), Some("abc"));
/// assert_eq!(head_len, raw.len());
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    minor_version: u8,
    headers: Headers,
}

impl Request {
    /// Parses a request head from the front of `buf`.
    ///
    /// On success returns the request and the length of its head in bytes.
    /// Header values that are not UTF-8 are skipped.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut head = httparse::Request::new(&mut slots);

        let httparse::Status::Complete(head_len) = head.parse(buf)? else {
            return Err(RequestError::Incomplete);
        };

        let method = match head.method {
            Some(name) => name.parse().unwrap_or_else(|never| match never {}),
            None => return Err(RequestError::MissingField("method")),
        };
        let target = head.path.ok_or(RequestError::MissingField("path"))?;
        let minor_version = head.version.ok_or(RequestError::MissingField("version"))?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        };

        let mut headers = Headers::with_capacity(head.headers.len());
        for field in head.headers.iter() {
            if let Ok(value) = std::str::from_utf8(field.value) {
                headers.insert(field.name, value);
            }
        }

        let request = Self {
            method,
            path,
            query,
            minor_version,
            headers,
        };
        Ok((request, head_len))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The client's `If-None-Match` validator, taken verbatim.
    pub fn if_none_match(&self) -> Option<&str> {
        self.headers.get(names::IF_NONE_MATCH)
    }

    /// Whether the connection stays open after the response.
    ///
    /// An explicit `Connection` header decides; otherwise HTTP/1.1 keeps the
    /// connection and HTTP/1.0 closes it.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get(names::CONNECTION) {
            Some(value) => value.eq_ignore_ascii_case("keep-alive"),
            None => self.minor_version == 1,
        }
    }

    /// Declared body length. Absent or unparsable counts as `None`.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get(names::CONTENT_LENGTH)?.trim().parse().ok()
    }
}

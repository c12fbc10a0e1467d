//! Upstream data source: the HTTP endpoint that owns garage availability.
//!
//! [`Upstream`] is what the snapshot service calls on a cache miss;
//! [`HttpUpstream`] implements it with `reqwest` and the linear-backoff
//! [`retry`] loop. Normalizing the returned JSON is the caller's job.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use thiserror::Error;

mod retry;

pub use retry::{RetryPolicy, retry};

/// Why a fetch attempt failed.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream responded with status {status}")]
    Status { status: u16 },

    #[error("upstream body is not valid JSON: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("failed to build upstream HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A source of raw upstream JSON.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self) -> Result<Value, UpstreamError>;
}

/// Fetches the configured URL over HTTP, retrying per [`RetryPolicy`].
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use parkhero::upstream::{HttpUpstream, RetryPolicy, Upstream};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let upstream = HttpUpstream::new(
///     "https://data.example/garages",
///     Some("Bearer s3cret".to_owned()),
///     RetryPolicy::default(),
///     Duration::from_secs(5),
/// )?;
/// let raw = upstream.fetch().await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpUpstream {
    client: reqwest::Client,
    url: String,
    auth: Option<String>,
    policy: RetryPolicy,
}

impl HttpUpstream {
    /// `auth` is sent verbatim as the `Authorization` header. `timeout`
    /// bounds each individual attempt.
    pub fn new(
        url: impl Into<String>,
        auth: Option<String>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            client,
            url: url.into(),
            auth,
            policy,
        })
    }

    async fn fetch_once(&self, attempt: u32) -> Result<Value, UpstreamError> {
        tracing::debug!(url = %self.url, attempt, "fetching upstream");

        let mut request = self.client.get(&self.url);
        if let Some(auth) = &self.auth {
            request = request.header(AUTHORIZATION, auth.as_str());
        }

        let response = request.send().await.map_err(UpstreamError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(UpstreamError::Decode)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    /// GETs the URL until a 2xx JSON body arrives or the policy is exhausted.
    async fn fetch(&self) -> Result<Value, UpstreamError> {
        retry(self.policy, |attempt| self.fetch_once(attempt)).await
    }
}

//! Process configuration, read from the environment (or the matching flags).

use std::time::Duration;

use clap::Parser;

use crate::upstream::RetryPolicy;

/// Upper bound for `CACHE_TTL`: 365 days.
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Runtime settings. Every value is optional; unset values take the
/// defaults shown by `--help`.
#[derive(Debug, Clone, Parser)]
#[command(name = "parkhero-proxy", version, about = "Caching proxy for parking-garage availability")]
pub struct Config {
    /// Upstream endpoint returning garage availability; demo data when unset
    #[arg(long, env = "UPSTREAM_URL")]
    pub upstream_url: Option<String>,

    /// Sent verbatim as the upstream `Authorization` header
    #[arg(long, env = "UPSTREAM_AUTH", hide_env_values = true)]
    pub upstream_auth: Option<String>,

    /// Seconds a snapshot stays cached, at most one year
    #[arg(long = "cache-ttl", env = "CACHE_TTL", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..=MAX_CACHE_TTL_SECS))]
    pub cache_ttl_secs: u64,

    /// Upstream attempts per cache miss
    #[arg(long, env = "RETRIES", default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub retries: u32,

    /// Linear backoff unit between upstream attempts, in milliseconds
    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value_t = 300)]
    pub retry_base_delay_ms: u64,

    /// Timeout for a single upstream attempt, in milliseconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_MS", default_value_t = 5000)]
    pub upstream_timeout_ms: u64,

    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Tracing filter directive, e.g. `info` or `parkhero=debug`
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Redis connection URL; the in-process cache is used when unset
    #[arg(long, env = "REDIS_URL", hide_env_values = true)]
    pub redis_url: Option<String>,

    /// Allowed CORS origins, comma-separated, or `*`
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl Config {
    /// The upstream URL, with a blank value counting as unset.
    pub fn upstream_url(&self) -> Option<&str> {
        non_empty(self.upstream_url.as_ref())
    }

    pub fn upstream_auth(&self) -> Option<&str> {
        non_empty(self.upstream_auth.as_ref())
    }

    pub fn redis_url(&self) -> Option<&str> {
        non_empty(self.redis_url.as_ref())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.retry_base_delay_ms))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

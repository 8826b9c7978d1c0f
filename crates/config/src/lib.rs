//! Status monitor configuration
use std::{net::SocketAddr, time::Duration};

use clap::{Parser, ValueEnum};
use url::Url;

/// Longest accepted poll interval in seconds (one day).
pub const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Poller configuration options
#[derive(Debug, Clone, Parser)]
pub struct PollerOpts {
    /// Seconds between poll cycles, also the backoff unit
    #[clap(
        long = "poll-interval-seconds",
        env = "POLL_INTERVAL_SECONDS",
        default_value = "90",
        value_parser = clap::value_parser!(u64).range(1..=MAX_POLL_INTERVAL_SECS)
    )]
    pub interval_secs: u64,
    /// Per-request timeout for status page fetches in seconds
    #[clap(
        long = "http-timeout-seconds",
        env = "HTTP_TIMEOUT_SECONDS",
        default_value = "15",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub http_timeout_secs: u64,
    /// Comma-separated provider keys to monitor; all built-in providers when unset
    #[clap(long = "providers", env = "MONITOR_PROVIDERS", value_delimiter = ',')]
    pub providers: Vec<String>,
}

impl PollerOpts {
    /// Time between poll cycles.
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Per-request HTTP timeout.
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Provider keys with surrounding whitespace and empty entries removed.
    pub fn provider_keys(&self) -> Vec<String> {
        self.providers.iter().map(|k| k.trim()).filter(|k| !k.is_empty()).map(str::to_owned).collect()
    }
}

/// Webhook configuration options
#[derive(Debug, Clone, Parser)]
pub struct WebhookOpts {
    /// Shared secret embedded in the webhook path; a random one is generated when unset
    #[clap(long = "webhook-secret", env = "WEBHOOK_SECRET")]
    pub secret: Option<String>,
    /// Public base URL subscribers deliver to
    #[clap(long = "webhook-base-url", env = "WEBHOOK_BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: Url,
}

impl WebhookOpts {
    /// The configured secret, or a fresh random UUID when none (or an empty one) is set.
    pub fn resolve_secret(&self) -> String {
        self.secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_owned)
    }

    /// Full webhook URL for `secret`.
    pub fn endpoint(&self, secret: &str) -> String {
        format!("{}/webhook/{}", self.base_url.as_str().trim_end_matches('/'), secret)
    }
}

/// HTTP server configuration options
#[derive(Debug, Clone, Parser)]
pub struct ServerOpts {
    /// Address to bind
    #[clap(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to bind
    #[clap(long, env = "PORT", default_value = "8000")]
    pub port: u16,
}

impl ServerOpts {
    /// Parses `host:port` into a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// CLI options for the status monitor
#[derive(Debug, Clone, Parser)]
#[clap(name = "status-monitor", about = "Statuspage incident monitor")]
pub struct Opts {
    /// Poller configuration
    #[clap(flatten)]
    pub poller: PollerOpts,

    /// Webhook configuration
    #[clap(flatten)]
    pub webhook: WebhookOpts,

    /// HTTP server configuration
    #[clap(flatten)]
    pub server: ServerOpts,

    /// Log output format
    #[clap(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

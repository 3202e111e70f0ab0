//! Waiting for a freshly provisioned endpoint's DNS name to resolve.
//!
//! A new project subdomain can take minutes to propagate. Bootstrap polls
//! the endpoint host until it resolves, and falls back to the account host
//! when one is configured and the project host never shows up.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio::time::Instant;

/// Default time to wait for a host to resolve.
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(900);

/// Delay between lookups.
pub const DNS_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Name resolution, behind a trait so tests can script it.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Succeeds once `host` resolves to at least one address.
    async fn resolve(&self, host: &str) -> io::Result<()>;
}

/// Resolver backed by the system resolver via [`tokio::net::lookup_host`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<()> {
        let mut addrs = tokio::net::lookup_host((host, 443)).await?;
        match addrs.next() {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{host} has no addresses"),
            )),
        }
    }
}

/// How long to wait and how often to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsWait {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for DnsWait {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DNS_TIMEOUT,
            interval: DNS_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DnsError {
    #[error("invalid project endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("DNS name {host} did not resolve within {} seconds", .timeout.as_secs())]
    Timeout { host: String, timeout: Duration },
}

/// Host name of a URL, or of a bare `host[:port]` value.
///
/// IPv6 literals come back without brackets.
pub fn hostname(value: &str) -> Option<String> {
    let value = value.trim();
    let url = if value.contains("://") {
        Url::parse(value)
    } else {
        Url::parse(&format!("https://{value}"))
    };
    let url = url.ok()?;
    let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']');
    (!host.is_empty()).then(|| host.to_string())
}

/// Poll `host` until it resolves or `wait.timeout` passes.
pub async fn wait_for_host(resolver: &dyn HostResolver, host: &str, wait: DnsWait) -> Result<(), DnsError> {
    let deadline = Instant::now().checked_add(wait.timeout);

    while deadline.is_none_or(|deadline| Instant::now() < deadline) {
        match resolver.resolve(host).await {
            Ok(()) => {
                tracing::debug!(host, "host resolved");
                return Ok(());
            }
            Err(e) => {
                tracing::info!(host, error = %e, "waiting for DNS propagation");
                tokio::time::sleep(wait.interval).await;
            }
        }
    }

    Err(DnsError::Timeout {
        host: host.to_string(),
        timeout: wait.timeout,
    })
}

/// Wait for the host of `endpoint`, then for `account_host` if the first
/// never resolves. Returns the host that resolved.
///
/// `account_host` may be a bare host or a URL. It is ignored when it names
/// the endpoint host.
pub async fn wait_for_endpoint(
    resolver: &dyn HostResolver,
    endpoint: &str,
    account_host: Option<&str>,
    wait: DnsWait,
) -> Result<String, DnsError> {
    let Some(primary) = hostname(endpoint) else {
        return Err(DnsError::InvalidEndpoint(endpoint.to_string()));
    };
    let fallback = account_host
        .and_then(hostname)
        .filter(|host| !host.eq_ignore_ascii_case(&primary));

    match wait_for_host(resolver, &primary, wait).await {
        Ok(()) => Ok(primary),
        Err(err) => {
            let Some(fallback) = fallback else {
                return Err(err);
            };
            tracing::warn!(host = %primary, fallback = %fallback, "project host did not resolve; trying account host");
            wait_for_host(resolver, &fallback, wait).await?;
            Ok(fallback)
        }
    }
}

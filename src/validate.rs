//! URL validation with DNS resolution.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::RuntimeFlavor;

use crate::error::{Denied, DenyReason, Error};
use crate::policy::Policy;
use crate::resolve::{Resolve, SystemResolver};
use crate::safe_url::SafeUrl;

/// Upper bound on name resolution before the guard fails closed.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of successful URL validation.
///
/// Only the guard constructs this, so `ips` always holds at least one
/// address.
#[derive(Debug, Clone)]
pub struct Validated {
    ips: Vec<IpAddr>,
    host: String,
    port: u16,
    url: String,
    https: bool,
}

impl Validated {
    /// Every address the host resolved to; all of them passed the policy.
    pub fn ips(&self) -> &[IpAddr] {
        &self.ips
    }

    /// The address to connect to.
    pub fn ip(&self) -> IpAddr {
        self.ips[0]
    }

    /// Normalized hostname (use for Host header / SNI).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Effective port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Full URL (normalized).
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_https(&self) -> bool {
        self.https
    }

    /// Get the socket address to connect to.
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip(), self.port)
    }
}

/// Decides whether an outbound request to a user-supplied URL may proceed.
///
/// Cheap to clone and safe to share across tasks: the policy and resolver
/// are immutable and behind `Arc`s.
///
/// # Example
///
/// ```rust,no_run
/// use outbound_guard::{Policy, UrlGuard};
///
/// # async fn example() -> Result<(), outbound_guard::Error> {
/// let policy = Policy::builder().allow_domain("example.com").build()?;
/// let guard = UrlGuard::new(policy)?;
///
/// match guard.validate("https://api.example.com/v1").await {
///     Ok(validated) => println!("connect to {}", validated.to_socket_addr()),
///     Err(denied) => eprintln!("{}", denied), // generic message only
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct UrlGuard {
    policy: Arc<Policy>,
    resolver: Arc<dyn Resolve>,
    resolve_timeout: Duration,
}

impl fmt::Debug for UrlGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlGuard")
            .field("policy", &self.policy)
            .field("resolve_timeout", &self.resolve_timeout)
            .finish_non_exhaustive()
    }
}

impl UrlGuard {
    /// Create a guard that resolves names with the system resolver.
    pub fn new(policy: Policy) -> Result<Self, Error> {
        Ok(Self::with_resolver(policy, SystemResolver::new()?))
    }

    /// Create a guard with an injected resolver.
    pub fn with_resolver(policy: Policy, resolver: impl Resolve + 'static) -> Self {
        Self {
            policy: Arc::new(policy),
            resolver: Arc::new(resolver),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    /// Bound name resolution; a lookup that takes longer is denied.
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Validate a URL, resolve DNS, and check every address against the policy.
    ///
    /// Stages run in a fixed order and stop at the first failure:
    /// syntax, protocol, credentials, host presence, host blacklist, domain
    /// whitelist, port, resolution, address checks.
    ///
    /// # Errors
    ///
    /// Returns [`Denied`] carrying the [`DenyReason`] of the stage that
    /// rejected the URL.
    pub async fn validate(&self, raw_url: &str) -> Result<Validated, Denied> {
        let safe_url = SafeUrl::parse(raw_url).map_err(|denied| deny(None, denied.reason()))?;
        let host = safe_url.host();

        if self.policy.is_host_blocked(host) {
            return Err(deny(Some(host), DenyReason::DisallowedHost));
        }

        if !self.policy.is_domain_allowed(host) {
            return Err(deny(Some(host), DenyReason::DisallowedDomain));
        }

        if !self.policy.is_port_allowed(safe_url.explicit_port()) {
            tracing::debug!(host, port = ?safe_url.explicit_port(), "port not in allowed list");
            return Err(deny(Some(host), DenyReason::DisallowedPort));
        }

        let ips = self.resolve_all(&safe_url).await?;

        for ip in &ips {
            if let Some(block) = self.policy.check_ip(*ip) {
                tracing::debug!(host, %ip, %block, "resolved address rejected");
                return Err(deny(Some(host), DenyReason::DisallowedIp));
            }
        }

        Ok(Validated {
            ips,
            host: host.to_string(),
            port: safe_url.port(),
            url: safe_url.as_str().to_string(),
            https: safe_url.is_https(),
        })
    }

    /// Synchronous version of [`validate`](Self::validate).
    ///
    /// This blocks the current thread while performing DNS resolution.
    /// Inside a multi-threaded Tokio runtime the worker is handed off with
    /// `block_in_place`. A current-thread runtime cannot block in place, so
    /// validation runs on a helper thread with its own runtime. Outside any
    /// runtime, a temporary one is created.
    pub fn validate_sync(&self, raw_url: &str) -> Result<Validated, Denied> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.validate(raw_url)))
            }
            Ok(_) => std::thread::scope(|scope| {
                scope
                    .spawn(|| self.validate_on_fresh_runtime(raw_url))
                    .join()
                    .unwrap_or_else(|_| {
                        tracing::error!("URL validation thread panicked");
                        Err(deny(None, DenyReason::UnresolvableHost))
                    })
            }),
            Err(_) => self.validate_on_fresh_runtime(raw_url),
        }
    }

    fn validate_on_fresh_runtime(&self, raw_url: &str) -> Result<Validated, Denied> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to start runtime for URL validation");
                deny(None, DenyReason::UnresolvableHost)
            })?;
        rt.block_on(self.validate(raw_url))
    }

    async fn resolve_all(&self, safe_url: &SafeUrl) -> Result<Vec<IpAddr>, Denied> {
        if let Some(ip) = safe_url.host_ip() {
            return Ok(vec![ip]);
        }

        let host = safe_url.host();
        let lookup = self.resolver.resolve(safe_url.host_for_lookup());

        match tokio::time::timeout(self.resolve_timeout, lookup).await {
            Ok(Ok(ips)) if !ips.is_empty() => Ok(ips),
            Ok(Ok(_)) => Err(deny(Some(host), DenyReason::UnresolvableHost)),
            Ok(Err(e)) => {
                tracing::debug!(host, error = %e, "resolution failed");
                Err(deny(Some(host), DenyReason::UnresolvableHost))
            }
            Err(_) => {
                tracing::debug!(host, timeout = ?self.resolve_timeout, "resolution timed out");
                Err(deny(Some(host), DenyReason::UnresolvableHost))
            }
        }
    }
}

/// Log a denial (host only, never resolved addresses) and build the error.
fn deny(host: Option<&str>, reason: DenyReason) -> Denied {
    match host {
        Some(host) => tracing::warn!(host, reason = reason.code(), "blocked outbound URL"),
        None => tracing::warn!(reason = reason.code(), "blocked outbound URL"),
    }
    Denied::new(reason)
}

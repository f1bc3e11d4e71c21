//! Name resolution as an injectable capability.
//!
//! The guard resolves every candidate host on every call; nothing here
//! caches answers, since a cached answer would let a rebinding attacker
//! swap the record between validation and use.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use hickory_resolver::TokioResolver;

use crate::error::Error;

/// Resolve a hostname to all of its addresses.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Returns every A/AAAA address for `host`.
    ///
    /// # Errors
    ///
    /// [`Error::Dns`] if the name does not resolve or has no addresses.
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, Error>;
}

/// Resolver backed by the platform's DNS configuration.
pub struct SystemResolver {
    inner: TokioResolver,
}

impl SystemResolver {
    /// Build a resolver from the system configuration with caching disabled.
    pub fn new() -> Result<Self, Error> {
        let mut builder = TokioResolver::builder_tokio()
            .map_err(|e| Error::dns_error("system resolver", e.to_string()))?;
        builder.options_mut().cache_size = 0;

        Ok(Self {
            inner: builder.build(),
        })
    }
}

impl std::fmt::Debug for SystemResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemResolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl Resolve for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        let response = self
            .inner
            .lookup_ip(host)
            .await
            .map_err(|e| Error::dns_error(host, e.to_string()))?;

        let addrs: Vec<IpAddr> = response.iter().collect();
        if addrs.is_empty() {
            return Err(Error::dns_error(host, "no IP addresses found"));
        }
        Ok(addrs)
    }
}

/// A fixed host table, for tests and air-gapped deployments.
///
/// Lookups are case-insensitive; unknown hosts fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the answer for `host`.
    pub fn with_host(mut self, host: &str, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        self.hosts
            .insert(host.to_lowercase(), addrs.into_iter().collect());
        self
    }
}

#[async_trait]
impl Resolve for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        match self.hosts.get(&host.to_lowercase()) {
            Some(addrs) if !addrs.is_empty() => Ok(addrs.clone()),
            Some(_) => Err(Error::dns_error(host, "no IP addresses found")),
            None => Err(Error::dns_error(host, "no such host")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver_known_host() {
        let resolver = StaticResolver::new().with_host(
            "example.com",
            ["93.184.216.34".parse().unwrap(), "2606:2800:220:1::1".parse().unwrap()],
        );

        let addrs = resolver.resolve("Example.COM").await.unwrap();
        assert_eq!(addrs.len(), 2);
    }

    #[tokio::test]
    async fn test_static_resolver_unknown_host() {
        let resolver = StaticResolver::new();
        let err = resolver.resolve("nowhere.example").await.unwrap_err();
        assert!(matches!(err, Error::Dns { .. }));
    }

    #[tokio::test]
    async fn test_static_resolver_empty_answer() {
        let resolver = StaticResolver::new().with_host("empty.example.com", Vec::<IpAddr>::new());
        assert!(resolver.resolve("empty.example.com").await.is_err());
    }
}

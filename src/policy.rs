//! Compiled outbound policy.

use std::collections::{BTreeSet, HashSet};
use std::net::IpAddr;

use crate::blocklist::{is_ip_blocked, IpBlock};
use crate::cidr::Ipv4Cidr;
use crate::config::PolicyConfig;
use crate::error::Error;
use crate::policy_builder::PolicyBuilder;

/// The compiled, immutable form of a [`PolicyConfig`].
///
/// All entries are trimmed and lower-cased, blank entries are dropped and
/// CIDR ranges are parsed up front, so a misconfigured deployment fails at
/// startup instead of under-protecting at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    allowed_domains: Vec<String>,
    blocked_hosts: HashSet<String>,
    blocked_cidrs: Vec<Ipv4Cidr>,
    allowed_ports: BTreeSet<u16>,
}

impl Policy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::new()
    }

    /// Compile a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCidr`] for the first malformed range.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, Error> {
        let blocked_cidrs = config
            .blacklist
            .ip_ranges
            .iter()
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| Ipv4Cidr::parse(entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            allowed_domains: normalize_entries(&config.whitelist.domains).collect(),
            blocked_hosts: normalize_entries(&config.blacklist.hosts).collect(),
            blocked_cidrs,
            allowed_ports: config.allowed_ports.iter().copied().collect(),
        })
    }

    /// Exact, case-insensitive match against the host blacklist.
    pub fn is_host_blocked(&self, host: &str) -> bool {
        self.blocked_hosts.contains(&host.to_lowercase())
    }

    /// Whether `host` is a whitelisted domain or a subdomain of one.
    ///
    /// `localhost` is never allowed, and an empty whitelist allows nothing.
    pub fn is_domain_allowed(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        if host == "localhost" {
            return false;
        }

        self.allowed_domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Whether an explicit port may be requested. `None` (the scheme
    /// default) is always allowed, as is anything under an empty port list.
    pub fn is_port_allowed(&self, port: Option<u16>) -> bool {
        match port {
            None => true,
            Some(_) if self.allowed_ports.is_empty() => true,
            Some(port) => self.allowed_ports.contains(&port),
        }
    }

    /// Check a resolved address against reserved classes and blacklisted ranges.
    pub fn check_ip(&self, ip: IpAddr) -> Option<IpBlock> {
        is_ip_blocked(ip, &self.blocked_cidrs)
    }

    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }

    pub fn blocked_cidrs(&self) -> &[Ipv4Cidr] {
        &self.blocked_cidrs
    }
}

fn normalize_entries(entries: &[String]) -> impl Iterator<Item = String> + '_ {
    entries
        .iter()
        .map(|entry| entry.trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
}

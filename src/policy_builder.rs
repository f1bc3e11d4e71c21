//! Programmatic construction of a [`Policy`].
//!
//! The builder is a fluent front end over [`PolicyConfig`]; building it runs
//! the same compilation as a loaded configuration file, so an invalid CIDR
//! range is reported by [`PolicyBuilder::build`].
//!
//! ```rust
//! use outbound_guard::Policy;
//!
//! let policy = Policy::builder()
//!     .allow_domain("example.com")
//!     .block_host("metadata.google.internal")
//!     .block_cidr("10.0.0.0/8")
//!     .build()
//!     .unwrap();
//!
//! assert!(policy.is_domain_allowed("api.example.com"));
//! assert!(policy.check_ip("10.1.2.3".parse().unwrap()).is_some());
//! ```

use crate::config::{Blacklist, PolicyConfig, Whitelist, DEFAULT_ALLOWED_PORTS};
use crate::error::Error;
use crate::policy::Policy;

/// Builder for [`Policy`].
///
/// Starts from an empty whitelist, empty blacklists and the default ports
/// (80 and 443). Each method consumes `self`.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    config: PolicyConfig,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self {
            config: PolicyConfig {
                whitelist: Whitelist::default(),
                blacklist: Blacklist {
                    hosts: Vec::new(),
                    ip_ranges: Vec::new(),
                },
                allowed_ports: DEFAULT_ALLOWED_PORTS.to_vec(),
            },
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Allow a domain and all of its subdomains.
    pub fn allow_domain(mut self, domain: &str) -> Self {
        self.config.whitelist.domains.push(domain.to_string());
        self
    }

    /// Block a hostname or IP literal (exact match).
    pub fn block_host(mut self, host: &str) -> Self {
        self.config.blacklist.hosts.push(host.to_string());
        self
    }

    /// Block an IPv4 range (CIDR notation). Validated by [`build`](Self::build).
    pub fn block_cidr(mut self, cidr: &str) -> Self {
        self.config.blacklist.ip_ranges.push(cidr.to_string());
        self
    }

    /// Replace the allowed port list.
    pub fn allowed_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.config.allowed_ports = ports.into_iter().collect();
        self
    }

    /// Allow any explicit port.
    pub fn allow_any_port(mut self) -> Self {
        self.config.allowed_ports.clear();
        self
    }

    /// Compile the policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCidr`] if any blocked range is malformed.
    pub fn build(self) -> Result<Policy, Error> {
        Policy::from_config(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builder_denies_everything() {
        let policy = PolicyBuilder::new().build().unwrap();
        assert!(!policy.is_domain_allowed("example.com"));
        assert!(policy.is_port_allowed(Some(80)));
        assert!(!policy.is_port_allowed(Some(8080)));
        assert!(policy.blocked_cidrs().is_empty());
    }

    #[test]
    fn test_builder_chaining() {
        let policy = PolicyBuilder::new()
            .allow_domain("example.com")
            .allow_domain("httpbin.org")
            .block_host("169.254.169.254")
            .block_cidr("10.0.0.0/8")
            .block_cidr("172.16.0.0/12")
            .allowed_ports([443])
            .build()
            .unwrap();

        assert!(policy.is_domain_allowed("httpbin.org"));
        assert!(policy.is_host_blocked("169.254.169.254"));
        assert_eq!(policy.blocked_cidrs().len(), 2);
        assert!(!policy.is_port_allowed(Some(80)));
        assert!(policy.is_port_allowed(Some(443)));
    }

    #[test]
    fn test_invalid_cidr_reported_on_build() {
        let result = PolicyBuilder::new()
            .block_cidr("not-a-cidr")
            .block_cidr("10.0.0.0/8")
            .build();
        assert!(matches!(result, Err(Error::InvalidCidr { .. })));
    }

    #[test]
    fn test_ipv6_cidr_rejected() {
        assert!(PolicyBuilder::new().block_cidr("2001:db8::/32").build().is_err());
    }

    #[test]
    fn test_allow_any_port() {
        let policy = PolicyBuilder::new().allow_any_port().build().unwrap();
        assert!(policy.is_port_allowed(Some(1)));
        assert!(policy.is_port_allowed(Some(65535)));
    }

    #[test]
    fn test_from_config_keeps_defaults() {
        let policy = PolicyBuilder::from_config(PolicyConfig::default())
            .allow_domain("example.com")
            .build()
            .unwrap();

        assert!(policy.is_host_blocked("metadata.google.internal"));
        assert_eq!(policy.blocked_cidrs().len(), 4);
    }
}

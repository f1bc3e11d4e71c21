//! Policy configuration as loaded from a TOML file.
//!
//! This is the raw, serializable shape. [`Policy`](crate::Policy) is the
//! compiled form the guard consults; build it once with
//! [`Policy::from_config`](crate::Policy::from_config) at startup.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Ports allowed when the configuration does not say otherwise.
pub const DEFAULT_ALLOWED_PORTS: [u16; 2] = [80, 443];

/// Recognized policy options.
///
/// Missing sections fall back to [`PolicyConfig::default`]: an empty
/// whitelist (deny everything), the cloud-metadata host blacklist, the
/// loopback/RFC 1918 CIDR blacklist and ports 80/443.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub whitelist: Whitelist,
    pub blacklist: Blacklist,
    /// Explicit ports that may be requested. Empty allows any port.
    #[serde(alias = "allowed-ports", alias = "allowedPorts")]
    pub allowed_ports: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Whitelist {
    /// Domains that may be requested, together with their subdomains.
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Blacklist {
    /// Hostnames or IP literals that are always rejected (exact match).
    pub hosts: Vec<String>,
    /// IPv4 CIDR ranges rejected after resolution.
    #[serde(alias = "ip-ranges", alias = "ipRanges")]
    pub ip_ranges: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            whitelist: Whitelist::default(),
            blacklist: Blacklist::default(),
            allowed_ports: DEFAULT_ALLOWED_PORTS.to_vec(),
        }
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Self {
            hosts: vec![
                "169.254.169.254".to_string(),
                "metadata.google.internal".to_string(),
            ],
            ip_ranges: vec![
                "127.0.0.0/8".to_string(),
                "10.0.0.0/8".to_string(),
                "172.16.0.0/12".to_string(),
                "192.168.0.0/16".to_string(),
            ],
        }
    }
}

impl PolicyConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(input: &str) -> Result<Self, Error> {
        toml::from_str(input).map_err(|e| Error::config("<inline>", e.to_string()))
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or is not a
    /// valid policy document. Callers should treat this as fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::config(path, e.to_string()))?;
        let config: Self = toml::from_str(&text).map_err(|e| Error::config(path, e.to_string()))?;

        tracing::debug!(
            path = %path.display(),
            domains = config.whitelist.domains.len(),
            blocked_hosts = config.blacklist.hosts.len(),
            blocked_ranges = config.blacklist.ip_ranges.len(),
            "loaded outbound policy"
        );

        Ok(config)
    }
}

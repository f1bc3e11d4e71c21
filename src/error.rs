//! Error types for outbound-guard.
//!
//! Two tiers: policy violations ([`Denied`], [`InvalidDomain`]) and
//! environmental failures (DNS, probe process, HTTP). Only
//! [`Error::public_message`] may be shown to the original requester.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Message returned to requesters for every URL denial.
pub const DENIED_MESSAGE: &str = "Invalid or disallowed URL";

/// Message returned to requesters for every rejected domain.
pub const INVALID_DOMAIN_MESSAGE: &str = "Invalid domain name";

/// Message returned to requesters for environmental failures.
pub const UNABLE_TO_PROCESS_MESSAGE: &str = "Unable to process request";

/// Which layer of the URL guard rejected a URL.
///
/// For internal logging and metrics only; never echo it to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    MalformedUrl,
    DisallowedProtocol,
    DisallowedPort,
    DisallowedHost,
    DisallowedDomain,
    DisallowedIp,
    UnresolvableHost,
}

impl DenyReason {
    /// Stable reason code, e.g. `DISALLOWED_IP`.
    pub const fn code(self) -> &'static str {
        match self {
            Self::MalformedUrl => "MALFORMED_URL",
            Self::DisallowedProtocol => "DISALLOWED_PROTOCOL",
            Self::DisallowedPort => "DISALLOWED_PORT",
            Self::DisallowedHost => "DISALLOWED_HOST",
            Self::DisallowedDomain => "DISALLOWED_DOMAIN",
            Self::DisallowedIp => "DISALLOWED_IP",
            Self::UnresolvableHost => "UNRESOLVABLE_HOST",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A URL was rejected by the guard.
///
/// `Display` is the generic [`DENIED_MESSAGE`] whatever the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid or disallowed URL")]
pub struct Denied {
    reason: DenyReason,
}

impl Denied {
    pub(crate) fn new(reason: DenyReason) -> Self {
        Self { reason }
    }

    /// The layer that rejected the URL.
    pub fn reason(&self) -> DenyReason {
        self.reason
    }
}

/// A domain name failed normalization or validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid domain name")]
pub struct InvalidDomain;

/// Errors that can occur while building policies or acting on guarded input.
#[derive(Debug, Error)]
pub enum Error {
    /// URL rejected by policy.
    #[error(transparent)]
    Denied(#[from] Denied),

    /// Domain rejected by the normalizer.
    #[error(transparent)]
    InvalidDomain(#[from] InvalidDomain),

    /// A configured CIDR range is malformed.
    #[error("invalid CIDR {entry:?} in blacklist.ip_ranges: {reason}")]
    InvalidCidr { entry: String, reason: String },

    /// The policy file could not be read or parsed.
    #[error("failed to load policy from {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// DNS resolution failed.
    #[error("DNS error for {host}: {message}")]
    Dns { host: String, message: String },

    /// The diagnostic process could not be run or exited unsuccessfully.
    #[error("probe of {domain} failed: {message}")]
    Probe { domain: String, message: String },

    /// The diagnostic process ran past its deadline and was killed.
    #[error("probe of {domain} timed out after {timeout:?}")]
    ProbeTimeout { domain: String, timeout: Duration },

    /// A redirect pointed to a URL the guard rejects.
    #[cfg(feature = "fetch")]
    #[error("redirect blocked: {redirect_url} ({reason})")]
    RedirectBlocked {
        original_url: String,
        redirect_url: String,
        reason: DenyReason,
    },

    /// Too many redirects.
    #[cfg(feature = "fetch")]
    #[error("too many redirects (max {max})")]
    TooManyRedirects { url: String, max: u8 },

    /// HTTP request failed.
    #[cfg(feature = "fetch")]
    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },
}

impl Error {
    pub(crate) fn invalid_cidr(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCidr {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn dns_error(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dns {
            host: host.into(),
            message: message.into(),
        }
    }

    pub(crate) fn probe_failed(domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Probe {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// The typed denial reason, if this error is a URL policy violation.
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Denied(denied) => Some(denied.reason()),
            #[cfg(feature = "fetch")]
            Self::RedirectBlocked { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Whether this is an expected policy rejection rather than a fault.
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Self::InvalidDomain(_)) || self.deny_reason().is_some()
    }

    /// The only text that may be returned to the original requester.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidDomain(_) => INVALID_DOMAIN_MESSAGE,
            _ if self.deny_reason().is_some() => DENIED_MESSAGE,
            _ => UNABLE_TO_PROCESS_MESSAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_display_is_generic() {
        for reason in [
            DenyReason::MalformedUrl,
            DenyReason::DisallowedIp,
            DenyReason::UnresolvableHost,
        ] {
            let denied = Denied::new(reason);
            assert_eq!(denied.to_string(), DENIED_MESSAGE);
            assert!(!denied.to_string().contains(reason.code()));
        }
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(DenyReason::MalformedUrl.code(), "MALFORMED_URL");
        assert_eq!(DenyReason::DisallowedPort.to_string(), "DISALLOWED_PORT");
        assert_eq!(DenyReason::UnresolvableHost.code(), "UNRESOLVABLE_HOST");
    }

    #[test]
    fn test_public_message_mapping() {
        let denied: Error = Denied::new(DenyReason::DisallowedHost).into();
        assert_eq!(denied.deny_reason(), Some(DenyReason::DisallowedHost));
        assert_eq!(denied.public_message(), DENIED_MESSAGE);
        assert!(denied.is_policy_violation());

        let invalid: Error = InvalidDomain.into();
        assert_eq!(invalid.public_message(), INVALID_DOMAIN_MESSAGE);
        assert!(invalid.is_policy_violation());

        let dns = Error::dns_error("internal.example.com", "timed out");
        assert_eq!(dns.public_message(), UNABLE_TO_PROCESS_MESSAGE);
        assert!(!dns.is_policy_violation());
        // Detail stays in Display for server-side logs
        assert!(dns.to_string().contains("internal.example.com"));
    }

    #[test]
    fn test_probe_timeout_message_is_generic_publicly() {
        let err = Error::ProbeTimeout {
            domain: "example.com".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(err.public_message(), UNABLE_TO_PROCESS_MESSAGE);
        assert!(err.deny_reason().is_none());
    }
}

//! Syntax, protocol and authority checks for candidate URLs.

use std::net::IpAddr;

use url::Url;

use crate::error::{Denied, DenyReason};

/// A parsed URL that passed the syntactic stages of the guard.
///
/// This represents a URL after parsing and normalization, but before any
/// policy or DNS checks. Use [`UrlGuard::validate`](crate::UrlGuard::validate)
/// for the full pipeline.
#[derive(Debug, Clone)]
pub struct SafeUrl {
    inner: Url,
    host: String,
}

impl SafeUrl {
    /// Parse and normalize a URL string.
    ///
    /// This performs, in order:
    /// - Rejection of blank input and non-standard IPv4 spellings (octal,
    ///   hexadecimal, integer, short-form)
    /// - Generic URL parsing
    /// - Scheme validation (only http/https allowed)
    /// - Rejection of userinfo (`user:pass@`)
    /// - Hostname presence and normalization (lowercase, no trailing dot)
    ///
    /// # Errors
    ///
    /// [`DenyReason::DisallowedProtocol`] for a non-HTTP scheme,
    /// [`DenyReason::MalformedUrl`] for everything else.
    pub fn parse(input: &str) -> Result<Self, Denied> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Denied::new(DenyReason::MalformedUrl));
        }

        // url::Url::parse would canonicalize these to dotted-quad form
        if has_non_standard_ip(input) {
            return Err(Denied::new(DenyReason::MalformedUrl));
        }

        let url = Url::parse(input).map_err(|_| Denied::new(DenyReason::MalformedUrl))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Denied::new(DenyReason::DisallowedProtocol));
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(Denied::new(DenyReason::MalformedUrl));
        }

        let host = url
            .host_str()
            .ok_or_else(|| Denied::new(DenyReason::MalformedUrl))?;
        let host = normalize_host(host).ok_or_else(|| Denied::new(DenyReason::MalformedUrl))?;

        Ok(Self { inner: url, host })
    }

    /// The normalized hostname; IPv6 literals keep their brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The host as an IP address, if it is an IP literal.
    pub fn host_ip(&self) -> Option<IpAddr> {
        self.host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .ok()
    }

    /// The hostname to hand to a resolver (IPv6 brackets removed).
    pub fn host_for_lookup(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// The explicitly requested port. `None` means the scheme default,
    /// including when the default is spelled out (`http://host:80`).
    pub fn explicit_port(&self) -> Option<u16> {
        self.inner.port()
    }

    /// The effective port, defaulting to 80 for http and 443 for https.
    pub fn port(&self) -> u16 {
        self.inner.port_or_known_default().unwrap_or(80)
    }

    pub fn path(&self) -> &str {
        self.inner.path()
    }

    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    pub fn is_https(&self) -> bool {
        self.inner.scheme() == "https"
    }

    pub fn into_url(self) -> Url {
        self.inner
    }
}

/// Lowercase and strip a trailing dot. `None` for an empty or badly
/// bracketed host.
fn normalize_host(host: &str) -> Option<String> {
    let mut normalized = host.trim().to_lowercase();

    if normalized.ends_with('.') {
        normalized.pop();
    }

    if normalized.is_empty() {
        return None;
    }

    if let Some(inner) = normalized.strip_prefix('[') {
        let inner = inner.strip_suffix(']')?;
        inner.parse::<std::net::Ipv6Addr>().ok()?;
    }

    Some(normalized)
}

/// Whether the authority of an http(s) URL spells an IPv4 address in a
/// non-standard form (octal, hex, integer or short-form).
fn has_non_standard_ip(url: &str) -> bool {
    // The URL parser drops tabs and newlines anywhere and, for http(s),
    // accepts any run of '/' or '\' (even none) after the scheme.
    let url_lower: String = url
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect::<String>()
        .to_lowercase();
    let Some(after_scheme) = url_lower
        .strip_prefix("http:")
        .or_else(|| url_lower.strip_prefix("https:"))
    else {
        return false;
    };
    let after_scheme = after_scheme.trim_start_matches(['/', '\\']);

    let host_end = after_scheme
        .find(['/', '\\', '?', '#'])
        .unwrap_or(after_scheme.len());
    let authority = &after_scheme[..host_end];

    let host_with_port = authority
        .rfind('@')
        .map(|i| &authority[i + 1..])
        .unwrap_or(authority);

    if host_with_port.starts_with('[') {
        return false;
    }

    let host = host_with_port
        .rfind(':')
        .map(|i| &host_with_port[..i])
        .unwrap_or(host_with_port);
    let host = host.strip_suffix('.').unwrap_or(host);

    is_non_standard_ip(host)
}

fn is_non_standard_ip(host: &str) -> bool {
    let parts: Vec<&str> = host.split('.').collect();
    let is_decimal = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
    let is_hex = |p: &str| {
        p.strip_prefix("0x")
            .is_some_and(|digits| digits.chars().all(|c| c.is_ascii_hexdigit()))
    };

    // Only all-numeric hosts are read as IPv4 by the URL parser
    if parts.len() > 4 || !parts.iter().all(|p| is_decimal(p) || is_hex(p)) {
        return false;
    }

    // Integer (2130706433) and short-form (127.1) spellings, hex parts,
    // and leading zeros (0177 = 127 in octal)
    parts.len() < 4
        || parts
            .iter()
            .any(|p| is_hex(p) || (p.len() > 1 && p.starts_with('0')))
}

//! Address classification for resolved IPs.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::cidr::Ipv4Cidr;

/// Reserved address classes that are never a valid outbound destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressClass {
    /// `0.0.0.0` or `::`.
    Unspecified,
    /// `127.0.0.0/8` or `::1`.
    Loopback,
    /// `169.254.0.0/16` or `fe80::/10`.
    LinkLocal,
    /// RFC 1918 ranges or the deprecated IPv6 `fec0::/10`.
    SiteLocal,
    /// `224.0.0.0/4` or `ff00::/8`.
    Multicast,
    /// IPv6 unique local addresses, `fc00::/7`.
    UniqueLocal,
}

impl AddressClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Loopback => "loopback",
            Self::LinkLocal => "link-local",
            Self::SiteLocal => "site-local",
            Self::Multicast => "multicast",
            Self::UniqueLocal => "unique-local",
        }
    }
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a resolved address was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpBlock {
    Reserved(AddressClass),
    Cidr(Ipv4Cidr),
}

impl fmt::Display for IpBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reserved(class) => write!(f, "{} address", class),
            Self::Cidr(cidr) => write!(f, "inside blacklisted range {}", cidr),
        }
    }
}

/// Classify an address, returning the reserved class it belongs to.
///
/// IPv4-mapped and IPv4-compatible IPv6 addresses are classified as the
/// IPv4 address they embed.
pub fn classify(ip: IpAddr) -> Option<AddressClass> {
    match ip {
        IpAddr::V4(ipv4) => classify_ipv4(ipv4),
        IpAddr::V6(ipv6) => classify_ipv6(ipv6),
    }
}

/// Check an address against the reserved classes and the configured ranges.
pub fn is_ip_blocked(ip: IpAddr, blocked_cidrs: &[Ipv4Cidr]) -> Option<IpBlock> {
    if let Some(class) = classify(ip) {
        return Some(IpBlock::Reserved(class));
    }

    let ipv4 = match ip {
        IpAddr::V4(ipv4) => ipv4,
        IpAddr::V6(ipv6) => embedded_ipv4(ipv6)?,
    };

    blocked_cidrs
        .iter()
        .find(|cidr| cidr.contains(ipv4))
        .map(|cidr| IpBlock::Cidr(*cidr))
}

fn classify_ipv4(ip: Ipv4Addr) -> Option<AddressClass> {
    if ip.is_unspecified() {
        return Some(AddressClass::Unspecified);
    }
    if ip.is_loopback() {
        return Some(AddressClass::Loopback);
    }
    if ip.is_link_local() {
        return Some(AddressClass::LinkLocal);
    }
    if ip.is_private() {
        return Some(AddressClass::SiteLocal);
    }
    if ip.is_multicast() {
        return Some(AddressClass::Multicast);
    }
    None
}

fn classify_ipv6(ip: Ipv6Addr) -> Option<AddressClass> {
    if ip.is_unspecified() {
        return Some(AddressClass::Unspecified);
    }

    // ::1 before the embedded-IPv4 check, which would otherwise see 0.0.0.1
    if ip.is_loopback() {
        return Some(AddressClass::Loopback);
    }

    if let Some(ipv4) = embedded_ipv4(ip) {
        return classify_ipv4(ipv4);
    }

    let first = ip.segments()[0];
    if (first & 0xffc0) == 0xfe80 {
        return Some(AddressClass::LinkLocal);
    }
    if (first & 0xffc0) == 0xfec0 {
        return Some(AddressClass::SiteLocal);
    }
    if ip.is_multicast() {
        return Some(AddressClass::Multicast);
    }
    if (first & 0xfe00) == 0xfc00 {
        return Some(AddressClass::UniqueLocal);
    }
    None
}

/// The IPv4 address carried by an IPv4-mapped (`::ffff:a.b.c.d`) or
/// IPv4-compatible (`::a.b.c.d`) IPv6 address.
fn embedded_ipv4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(ipv4) = ip.to_ipv4_mapped() {
        return Some(ipv4);
    }

    let segments = ip.segments();
    // ::, ::1 are not IPv4-compatible addresses
    if segments[0..6] == [0, 0, 0, 0, 0, 0] && (segments[6] != 0 || segments[7] > 1) {
        let [.., a, b, c, d] = ip.octets();
        return Some(Ipv4Addr::new(a, b, c, d));
    }
    None
}

//! IPv4 CIDR ranges for the configured address blacklist.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net};

use crate::error::Error;

/// An IPv4 range in `a.b.c.d/n` notation.
///
/// Host bits in the configured address are masked off, so `10.1.2.3/8`
/// denotes the same range as `10.0.0.0/8`. Containment is computed on
/// unsigned 32-bit values: `(addr & mask) == network`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    network: u32,
    mask: u32,
    prefix_len: u8,
}

impl Ipv4Cidr {
    /// Parse a configured range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCidr`] if the prefix length is outside
    /// `0..=32`, the address is not a dotted-quad IPv4 address, or the
    /// range is IPv6.
    pub fn parse(entry: &str) -> Result<Self, Error> {
        let net: IpNet = entry
            .trim()
            .parse()
            .map_err(|e: ipnet::AddrParseError| Error::invalid_cidr(entry, e.to_string()))?;

        match net {
            IpNet::V4(v4) => Ok(Self::from(v4)),
            IpNet::V6(_) => Err(Error::invalid_cidr(
                entry,
                "only IPv4 ranges are supported",
            )),
        }
    }

    /// Check whether `ip` falls inside this range.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        (u32::from(ip) & self.mask) == self.network
    }

    /// First address of the range.
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

impl From<Ipv4Net> for Ipv4Cidr {
    fn from(net: Ipv4Net) -> Self {
        let mask = u32::from(net.netmask());
        Self {
            network: u32::from(net.addr()) & mask,
            mask,
            prefix_len: net.prefix_len(),
        }
    }
}

impl FromStr for Ipv4Cidr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Ipv4Cidr {
        Ipv4Cidr::parse(s).unwrap()
    }

    #[test]
    fn test_contains_boundaries() {
        let ten = cidr("10.0.0.0/8");
        assert!(ten.contains(Ipv4Addr::new(10, 0, 0, 0)));
        assert!(ten.contains(Ipv4Addr::new(10, 255, 255, 255)));
        assert!(!ten.contains(Ipv4Addr::new(11, 0, 0, 0)));
        assert!(!ten.contains(Ipv4Addr::new(9, 255, 255, 255)));
    }

    #[test]
    fn test_172_range() {
        let range = cidr("172.16.0.0/12");
        assert!(range.contains(Ipv4Addr::new(172, 16, 0, 1)));
        assert!(range.contains(Ipv4Addr::new(172, 31, 255, 255)));
        assert!(!range.contains(Ipv4Addr::new(172, 32, 0, 0)));
        assert!(!range.contains(Ipv4Addr::new(172, 15, 255, 255)));
    }

    #[test]
    fn test_high_bit_ranges() {
        // Bit 31 set: must not be confused by sign handling
        let upper_half = cidr("128.0.0.0/1");
        assert!(upper_half.contains(Ipv4Addr::new(255, 255, 255, 255)));
        assert!(upper_half.contains(Ipv4Addr::new(128, 0, 0, 1)));
        assert!(!upper_half.contains(Ipv4Addr::new(127, 255, 255, 255)));

        let multicast = cidr("224.0.0.0/4");
        assert!(multicast.contains(Ipv4Addr::new(239, 1, 2, 3)));
        assert!(!multicast.contains(Ipv4Addr::new(240, 0, 0, 0)));
    }

    #[test]
    fn test_zero_and_full_prefix() {
        let everything = cidr("0.0.0.0/0");
        assert!(everything.contains(Ipv4Addr::new(8, 8, 8, 8)));
        assert!(everything.contains(Ipv4Addr::new(255, 255, 255, 255)));

        let single = cidr("192.168.1.100/32");
        assert!(single.contains(Ipv4Addr::new(192, 168, 1, 100)));
        assert!(!single.contains(Ipv4Addr::new(192, 168, 1, 101)));
    }

    #[test]
    fn test_host_bits_masked() {
        let range = cidr("10.1.2.3/8");
        assert_eq!(range.network(), Ipv4Addr::new(10, 0, 0, 0));
        assert!(range.contains(Ipv4Addr::new(10, 9, 9, 9)));
        assert_eq!(range.to_string(), "10.0.0.0/8");
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        assert_eq!(cidr("  10.0.0.0/8 "), cidr("10.0.0.0/8"));
    }

    #[test]
    fn test_reject_malformed() {
        assert!(Ipv4Cidr::parse("10.0.0.0/33").is_err());
        assert!(Ipv4Cidr::parse("10.0.0.0/-1").is_err());
        assert!(Ipv4Cidr::parse("10.0.0.0").is_err());
        assert!(Ipv4Cidr::parse("10.0.0/8").is_err());
        assert!(Ipv4Cidr::parse("300.0.0.0/8").is_err());
        assert!(Ipv4Cidr::parse("internal/8").is_err());
        assert!(Ipv4Cidr::parse("").is_err());
    }

    #[test]
    fn test_reject_ipv6() {
        let err = Ipv4Cidr::parse("fc00::/7").unwrap_err();
        assert!(err.to_string().contains("only IPv4"));
    }

    #[test]
    fn test_from_str() {
        let range: Ipv4Cidr = "192.168.0.0/16".parse().unwrap();
        assert_eq!(range.prefix_len(), 16);
    }
}

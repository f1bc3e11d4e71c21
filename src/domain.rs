//! Domain name normalization and validation.
//!
//! A [`NormalizedDomain`] is safe to pass as a single argv element to a
//! diagnostic command: it contains only `[a-z0-9._-]`, so no whitespace,
//! shell metacharacters or path separators can reach the process.

use std::ffi::OsStr;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::InvalidDomain;

pub const MIN_DOMAIN_LENGTH: usize = 3;
pub const MAX_DOMAIN_LENGTH: usize = 253;
pub const MAX_LABEL_LENGTH: usize = 63;

static DOMAIN_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9._-]+$").expect("domain charset pattern compiles"));

// Labels may not start or end with a hyphen; the final label is either
// punycode or starts with a letter.
static DOMAIN_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-z0-9](?:[a-z0-9_-]{0,61}[a-z0-9])?\.)+(?:xn--[a-z0-9-]{1,59}|[a-z](?:[a-z0-9-]{0,61}[a-z0-9])?)$",
    )
    .expect("domain shape pattern compiles")
});

/// An ASCII, lower-case, fully validated domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedDomain(String);

impl NormalizedDomain {
    /// Normalize and validate free-text input. See [`normalize_and_validate`].
    pub fn parse(input: &str) -> Result<Self, InvalidDomain> {
        normalize_and_validate(input)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<OsStr> for NormalizedDomain {
    fn as_ref(&self) -> &OsStr {
        OsStr::new(&self.0)
    }
}

impl FromStr for NormalizedDomain {
    type Err = InvalidDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Trim, convert to ASCII (IDNA, STD3 rules), lower-case and validate a
/// domain name.
///
/// The result has 3 to 253 characters, at least two labels, labels of 1 to
/// 63 characters without leading or trailing hyphens, and no empty labels.
/// Normalizing an already normalized domain returns it unchanged.
///
/// # Errors
///
/// [`InvalidDomain`] on any violation; no sub-reason is reported.
pub fn normalize_and_validate(input: &str) -> Result<NormalizedDomain, InvalidDomain> {
    let trimmed = input.trim();
    if !length_in_bounds(trimmed) {
        return Err(InvalidDomain);
    }

    let ascii = idna::domain_to_ascii_strict(trimmed)
        .map_err(|_| InvalidDomain)?
        .to_lowercase();

    // Punycode conversion can change the length
    if !length_in_bounds(&ascii) {
        return Err(InvalidDomain);
    }

    if ascii.starts_with('.') || ascii.ends_with('.') || ascii.contains("..") {
        return Err(InvalidDomain);
    }

    if !DOMAIN_CHARS.is_match(&ascii) {
        return Err(InvalidDomain);
    }

    let labels: Vec<&str> = ascii.split('.').collect();
    if labels.len() < 2 {
        return Err(InvalidDomain);
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LENGTH
            && !label.starts_with('-')
            && !label.ends_with('-')
    });
    if !labels_ok {
        return Err(InvalidDomain);
    }

    if !DOMAIN_SHAPE.is_match(&ascii) {
        return Err(InvalidDomain);
    }

    Ok(NormalizedDomain(ascii))
}

fn length_in_bounds(s: &str) -> bool {
    (MIN_DOMAIN_LENGTH..=MAX_DOMAIN_LENGTH).contains(&s.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(input: &str) -> Result<String, InvalidDomain> {
        normalize_and_validate(input).map(NormalizedDomain::into_string)
    }

    #[test]
    fn test_trims_and_lowercases() {
        assert_eq!(normalize("  Example.COM  ").unwrap(), "example.com");
        assert_eq!(normalize("api.Example.com").unwrap(), "api.example.com");
    }

    #[test]
    fn test_idn_converted_to_punycode() {
        let domain = normalize("täst.de").unwrap();
        assert!(domain.starts_with("xn--"), "{}", domain);
        assert!(domain.ends_with(".de"), "{}", domain);
        assert!(domain.is_ascii());

        // Upper-case input folds to the same punycode
        assert_eq!(normalize("TÄST.DE").unwrap(), domain);
    }

    #[test]
    fn test_idempotent() {
        for input in ["  Example.COM  ", "täst.de", "a.b.example.co.uk", "my-host.example.org"] {
            let once = normalize(input).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(normalize("").is_err());
        assert!(normalize("   ").is_err());
        assert!(normalize("\t\n").is_err());
    }

    #[test]
    fn test_rejects_shell_metacharacters_and_whitespace() {
        let payloads = [
            "example.com;whoami",
            "example.com && whoami",
            "example.com|whoami",
            "example.com`whoami`",
            "example.com$(whoami)",
            "example.com\nwhoami",
            "ex ample.com",
            "example.com/../../etc/passwd",
            "example.com>out.txt",
            "-c.example.com",
        ];
        for payload in payloads {
            assert!(normalize(payload).is_err(), "{:?}", payload);
        }
    }

    #[test]
    fn test_rejects_invalid_label_shapes() {
        for input in [
            "-example.com",
            "example-.com",
            ".example.com",
            "example.com.",
            "example..com",
            "localhost",
            "example.-com",
        ] {
            assert!(normalize(input).is_err(), "{:?}", input);
        }
    }

    #[test]
    fn test_rejects_ip_literals() {
        assert!(normalize("127.0.0.1").is_err());
        assert!(normalize("10.0.0.1").is_err());
    }

    #[test]
    fn test_length_bounds() {
        assert!(normalize("ab").is_err());
        assert_eq!(normalize("a.b").unwrap(), "a.b");

        let label = "a".repeat(63);
        let too_long = format!("{label}.{label}.{label}.{label}.com");
        assert!(too_long.len() > MAX_DOMAIN_LENGTH);
        assert!(normalize(&too_long).is_err());

        let at_limit = format!("{label}.{label}.{label}.{}.com", "a".repeat(57));
        assert_eq!(at_limit.len(), MAX_DOMAIN_LENGTH);
        assert!(normalize(&at_limit).is_ok());
    }

    #[test]
    fn test_rejects_overlong_label() {
        let domain = format!("{}.com", "a".repeat(64));
        assert!(normalize(&domain).is_err());
    }

    #[test]
    fn test_parse_and_display() {
        let domain: NormalizedDomain = " Example.com ".parse().unwrap();
        assert_eq!(domain.to_string(), "example.com");
        assert_eq!(domain.as_str(), "example.com");
        let os: &OsStr = domain.as_ref();
        assert_eq!(os, "example.com");
    }
}

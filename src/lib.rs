//! # outbound-guard
//!
//! Decides whether an outbound network action on user-supplied input may
//! proceed. Defends against SSRF, DNS rebinding, shell injection through
//! domain arguments and disclosure of internal topology.
//!
//! - [`UrlGuard`] validates a URL to fetch: protocol, host blacklist, domain
//!   whitelist, port policy, then resolves the host and rejects any reserved
//!   or blacklisted address.
//! - [`normalize_and_validate`] turns a free-text domain into a
//!   [`NormalizedDomain`] that is safe to pass as a process argument.
//!
//! The guard does not make HTTP requests itself; [`fetch`] (feature
//! `fetch`) is a thin client that only ever connects to approved addresses.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use outbound_guard::{Policy, PolicyConfig, UrlGuard};
//!
//! # async fn example() -> Result<(), outbound_guard::Error> {
//! let config = PolicyConfig::load("policy.toml")?;
//! let guard = UrlGuard::new(Policy::from_config(&config)?)?;
//!
//! if let Err(denied) = guard.validate("http://169.254.169.254/latest/").await {
//!     tracing::warn!(reason = %denied.reason(), "rejected");
//!     println!("{}", denied); // "Invalid or disallowed URL"
//! }
//! # Ok(())
//! # }
//! ```

mod blocklist;
mod cidr;
mod config;
mod domain;
mod error;
pub mod logging;
mod policy;
mod policy_builder;
mod probe;
mod resolve;
mod safe_url;
mod validate;

#[cfg(feature = "fetch")]
mod fetch;

pub use blocklist::{classify, AddressClass, IpBlock};
pub use cidr::Ipv4Cidr;
pub use config::{Blacklist, PolicyConfig, Whitelist, DEFAULT_ALLOWED_PORTS};
pub use domain::{normalize_and_validate, NormalizedDomain};
pub use error::{
    Denied, DenyReason, Error, InvalidDomain, DENIED_MESSAGE, INVALID_DOMAIN_MESSAGE,
    UNABLE_TO_PROCESS_MESSAGE,
};
pub use policy::Policy;
pub use policy_builder::PolicyBuilder;
pub use probe::{Prober, DEFAULT_PROBE_TIMEOUT};
pub use resolve::{Resolve, StaticResolver, SystemResolver};
pub use safe_url::SafeUrl;
pub use validate::{UrlGuard, Validated, DEFAULT_RESOLVE_TIMEOUT};

#[cfg(feature = "fetch")]
pub use fetch::{fetch, FetchResult};

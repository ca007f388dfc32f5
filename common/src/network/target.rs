//! # Scan Target Model
//!
//! Defines the possible subjects of a scan.
//!
//! A target can be:
//! * A single IPv4 or IPv6 address.
//! * An IPv4 or IPv6 network in CIDR form (e.g., `192.168.1.0/24`).
//! * A hostname. Any string is accepted, resolution is left to the engine.

use std::fmt::{self, Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use pnet::ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

use crate::error::ScanError;

const IPV4_LEN: usize = 4;
const IPV6_LEN: usize = 16;

/// Represents a distinct target to be scanned.
///
/// Immutable once constructed. The byte-level constructors mirror what an
/// engine accepts and reject malformed input with a [`ScanError`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// A single IPv4 host.
    Ipv4(Ipv4Addr),
    /// A single IPv6 host.
    Ipv6(Ipv6Addr),
    /// An IPv4 network and prefix length.
    Ipv4Network(Ipv4Network),
    /// An IPv6 network and prefix length.
    Ipv6Network(Ipv6Network),
    /// A hostname. Might not conform to any RFC.
    Hostname(String),
}

impl Target {
    /// Builds an IPv4 target from exactly 4 packed octets.
    pub fn new_ip_v4_address(octets: &[u8]) -> Result<Self, ScanError> {
        let octets: [u8; IPV4_LEN] = octets.try_into().map_err(|_| ScanError::InvalidLength)?;
        Ok(Target::Ipv4(Ipv4Addr::from(octets)))
    }

    /// Builds an IPv6 target from exactly 16 packed octets.
    pub fn new_ip_v6_address(octets: &[u8]) -> Result<Self, ScanError> {
        let octets: [u8; IPV6_LEN] = octets.try_into().map_err(|_| ScanError::InvalidLength)?;
        Ok(Target::Ipv6(Ipv6Addr::from(octets)))
    }

    /// Builds an IPv4 network. The prefix must not exceed 32.
    pub fn new_ip_v4_network(octets: &[u8], prefix: u8) -> Result<Self, ScanError> {
        let octets: [u8; IPV4_LEN] = octets.try_into().map_err(|_| ScanError::InvalidLength)?;
        let network = Ipv4Network::new(Ipv4Addr::from(octets), prefix)
            .map_err(|_| ScanError::InvalidLength)?;
        Ok(Target::Ipv4Network(network))
    }

    /// Builds an IPv6 network. The prefix must not exceed 128.
    pub fn new_ip_v6_network(octets: &[u8], prefix: u8) -> Result<Self, ScanError> {
        let octets: [u8; IPV6_LEN] = octets.try_into().map_err(|_| ScanError::InvalidLength)?;
        let network = Ipv6Network::new(Ipv6Addr::from(octets), prefix)
            .map_err(|_| ScanError::InvalidLength)?;
        Ok(Target::Ipv6Network(network))
    }

    /// Builds a hostname target.
    ///
    /// We are liberal about what we attempt a lookup on, so the only
    /// requirement is valid UTF-8. Empty names are accepted too.
    pub fn new_hostname(bytes: &[u8]) -> Result<Self, ScanError> {
        let hostname = std::str::from_utf8(bytes).map_err(|_| ScanError::InvalidUtf8)?;
        Ok(Target::Hostname(hostname.to_owned()))
    }
}

impl From<IpAddr> for Target {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(ipv4_addr) => Target::Ipv4(ipv4_addr),
            IpAddr::V6(ipv6_addr) => Target::Ipv6(ipv6_addr),
        }
    }
}

impl From<IpNetwork> for Target {
    fn from(network: IpNetwork) -> Self {
        match network {
            IpNetwork::V4(ipv4_network) => Target::Ipv4Network(ipv4_network),
            IpNetwork::V6(ipv6_network) => Target::Ipv6Network(ipv6_network),
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Target::Ipv4(addr) => addr.fmt(f),
            Target::Ipv6(addr) => addr.fmt(f),
            Target::Ipv4Network(network) => write!(f, "{}/{}", network.ip(), network.prefix()),
            Target::Ipv6Network(network) => write!(f, "{}/{}", network.ip(), network.prefix()),
            Target::Hostname(hostname) => hostname.fmt(f),
        }
    }
}

impl FromStr for Target {
    type Err = String;

    /// Parses a string into a `Target`.
    ///
    /// Supported formats:
    /// * **Host**: Single IPv4/IPv6 address (e.g., "192.168.1.5", "::1").
    /// * **CIDR**: "Network/Prefix" (e.g., "192.168.1.0/24").
    /// * **Hostname**: anything else that is not blank.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("target cannot be empty".to_string());
        }

        if let Some(target) = parse_host(s) {
            return Ok(target);
        }

        if let Some(target) = parse_cidr(s) {
            return Ok(target);
        }

        Ok(Target::Hostname(s.to_owned()))
    }
}

/// Parses a single IP address.
fn parse_host(s: &str) -> Option<Target> {
    s.parse::<IpAddr>().ok().map(Target::from)
}

/// Parses CIDR notation like "192.168.1.0/24" or "fd00::/64".
fn parse_cidr(s: &str) -> Option<Target> {
    if !s.contains('/') {
        return None;
    }
    s.parse::<IpNetwork>().ok().map(Target::from)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

//! Target expressions: single addresses, CIDR ranges and hostnames.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// A single host to probe, resolved to an IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanTarget {
    /// The expression this host came from (hostname, IP or CIDR).
    pub original: String,
    /// The resolved IP address.
    pub ip: IpAddr,
}

impl ScanTarget {
    pub fn new(original: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            original: original.into(),
            ip,
        }
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.original == self.ip.to_string() {
            write!(f, "{}", self.ip)
        } else {
            write!(f, "{} ({})", self.original, self.ip)
        }
    }
}

/// Error type for target parsing and resolution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target format: {0}")]
    InvalidFormat(String),
    #[error("failed to resolve hostname '{0}': {1}")]
    DnsResolutionFailed(String, String),
    #[error("no IP addresses found for hostname '{0}'")]
    NoAddressesFound(String),
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("CIDR range too large: {0} addresses (max: {1})")]
    CidrTooLarge(u128, u128),
}

/// A parsed target expression.
#[derive(Debug, Clone)]
pub enum TargetSpec {
    Single(IpAddr),
    Cidr(IpNetwork),
    Hostname(String),
}

impl TargetSpec {
    /// Largest network a single scan request may expand to.
    pub const MAX_CIDR_HOSTS: u128 = 65536;

    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Single(ip));
        }

        if s.contains('/') {
            let network: IpNetwork = s
                .parse()
                .map_err(|_| TargetError::InvalidCidr(s.to_string()))?;
            let hosts = network_size(&network);
            if hosts > Self::MAX_CIDR_HOSTS {
                return Err(TargetError::CidrTooLarge(hosts, Self::MAX_CIDR_HOSTS));
            }
            return Ok(Self::Cidr(network));
        }

        if is_valid_hostname(s) {
            Ok(Self::Hostname(s.to_string()))
        } else {
            Err(TargetError::InvalidFormat(s.to_string()))
        }
    }

    /// Expand into concrete hosts.
    ///
    /// IPv4 networks wider than /31 skip their network and broadcast
    /// addresses. Hostnames resolve to their first address.
    pub async fn resolve(&self) -> Result<Vec<ScanTarget>, TargetError> {
        match self {
            Self::Single(ip) => Ok(vec![ScanTarget::new(ip.to_string(), *ip)]),
            Self::Cidr(network) => {
                let original = network.to_string();
                Ok(network
                    .iter()
                    .filter(|ip| match (network, ip) {
                        (IpNetwork::V4(net), IpAddr::V4(addr)) if net.prefix() < 31 => {
                            *addr != net.network() && *addr != net.broadcast()
                        }
                        _ => true,
                    })
                    .map(|ip| ScanTarget::new(original.clone(), ip))
                    .collect())
            }
            Self::Hostname(hostname) => {
                let resolver =
                    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
                let response = resolver.lookup_ip(hostname.as_str()).await.map_err(|e| {
                    TargetError::DnsResolutionFailed(hostname.clone(), e.to_string())
                })?;
                let ip = response
                    .iter()
                    .next()
                    .ok_or_else(|| TargetError::NoAddressesFound(hostname.clone()))?;
                Ok(vec![ScanTarget::new(hostname.clone(), ip)])
            }
        }
    }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{}", ip),
            Self::Cidr(network) => write!(f, "{}", network),
            Self::Hostname(hostname) => write!(f, "{}", hostname),
        }
    }
}

fn network_size(network: &IpNetwork) -> u128 {
    match network {
        IpNetwork::V4(net) => u128::from(net.size()),
        IpNetwork::V6(net) => match 128 - u32::from(net.prefix()) {
            128 => u128::MAX,
            bits => 1u128 << bits,
        },
    }
}

/// Labels of 1-63 alphanumerics or hyphens, not starting or ending with a hyphen.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

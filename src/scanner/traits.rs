//! Scanner trait abstractions.
//!
//! Two seams live here. [`ScanEngine`] is what the orchestration layer
//! talks to: one request in, a list of port results out. [`Scanner`] is the
//! per-host prober the native engine fans out over ports.

use crate::error::ScanError;
use crate::types::Port;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Status of a scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    /// Port is open (service listening).
    Open,
    /// Port is closed (no service, RST received).
    Closed,
    /// Port is filtered (no response, possibly by firewall).
    Filtered,
    /// Port is either open or filtered (UDP-specific ambiguity).
    #[serde(rename = "open|filtered")]
    OpenFiltered,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
            Self::OpenFiltered => write!(f, "open|filtered"),
        }
    }
}

/// Result of probing a single port on a single host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortResult {
    /// Host the port belongs to.
    pub host: IpAddr,
    /// The port number that was scanned.
    pub port: Port,
    /// Status determined by the scan.
    pub status: PortStatus,
    /// Detected or inferred service name.
    pub service: String,
    /// Banner captured from the service (if any).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Response time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl PortResult {
    pub fn new(host: IpAddr, port: Port, status: PortStatus, service: impl Into<String>) -> Self {
        Self {
            host,
            port,
            status,
            service: service.into(),
            banner: None,
            response_time_ms: None,
        }
    }

    pub fn with_banner(mut self, banner: Option<String>) -> Self {
        self.banner = banner;
        self
    }

    pub fn with_response_time(mut self, time_ms: u64) -> Self {
        self.response_time_ms = Some(time_ms);
        self
    }

    /// Check if the port is open (or possibly open).
    pub fn is_open(&self) -> bool {
        matches!(self.status, PortStatus::Open | PortStatus::OpenFiltered)
    }
}

/// Probe techniques a scan request may ask for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// TCP connect scan, no special privileges required.
    #[default]
    #[serde(alias = "connect")]
    #[value(alias = "connect")]
    Tcp,
    /// SYN half-open scan.
    Syn,
    /// FIN scan.
    Fin,
    /// NULL scan (no flags set).
    Null,
    /// XMAS scan (FIN, PSH and URG set).
    Xmas,
    /// ACK scan, for firewall rule mapping.
    Ack,
    /// UDP probe scan.
    Udp,
}

impl ScanType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Syn => "syn",
            Self::Fin => "fin",
            Self::Null => "null",
            Self::Xmas => "xmas",
            Self::Ack => "ack",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" | "connect" => Ok(Self::Tcp),
            "syn" => Ok(Self::Syn),
            "fin" => Ok(Self::Fin),
            "null" => Ok(Self::Null),
            "xmas" => Ok(Self::Xmas),
            "ack" => Ok(Self::Ack),
            "udp" => Ok(Self::Udp),
            _ => Err(format!("unknown scan type: {}", s)),
        }
    }
}

/// Everything an engine needs to run one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// Host, IP or CIDR expression.
    pub target: String,
    /// Port expression, see [`crate::types::PortSpec`].
    pub ports: String,
    pub scan_type: ScanType,
    /// Per-probe timeout. Enforcing it is the engine's job.
    pub timeout: Duration,
    /// Maximum probes in flight for this scan.
    pub workers: usize,
    pub enable_service: bool,
    pub enable_os: bool,
    /// Version probe intensity, 0-9.
    pub version_intensity: u8,
    pub guess_os: bool,
    pub limit_os_scan: bool,
}

/// The engine the orchestration layer delegates probing to.
///
/// Implementations must return an error rather than panic for requests
/// they cannot serve. No cancellation signal is passed in: once started,
/// a scan runs to completion.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    async fn scan(&self, options: &ScanOptions) -> Result<Vec<PortResult>, ScanError>;
}

/// Per-host port prober used by the native engine.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Get the scan type this scanner implements.
    fn scan_type(&self) -> ScanType;

    /// Get the target IP address.
    fn target(&self) -> IpAddr;

    /// Scan a single port.
    async fn scan_port(&self, port: Port) -> PortResult;
}

/// A boxed scanner for dynamic dispatch.
pub type BoxedScanner = Box<dyn Scanner>;

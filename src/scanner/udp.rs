//! UDP probe scanner.
//!
//! A reply means open, an ICMP port-unreachable surfaced as a refused
//! `recv` means closed, silence after all retries is `open|filtered`.

use crate::scanner::traits::{PortResult, PortStatus, ScanType, Scanner};
use crate::services::get_service_description;
use crate::types::Port;
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Service-specific payloads that tend to elicit a reply.
const UDP_PROBES: &[(u16, &[u8])] = &[
    (53, b"\x00\x00\x10\x00\x00\x00\x00\x00\x00\x00\x00\x00"),
    (69, b"\x00\x01test\x00netascii\x00"),
    (123, b"\xe3\x00\x04\xfa\x00\x01\x00\x00\x00\x01\x00\x00"),
    (161, b"\x30\x26\x02\x01\x01\x04\x06public\xa0\x19\x02\x04"),
];

const DEFAULT_PROBE: &[u8] = b"\x00";

const RETRY_DELAY: Duration = Duration::from_millis(100);

pub struct UdpScanner {
    target: IpAddr,
    timeout: Duration,
    retries: u32,
}

impl UdpScanner {
    pub fn new(target: IpAddr, timeout: Duration) -> Self {
        Self {
            target,
            timeout,
            retries: 2,
        }
    }

    async fn probe(&self, port: u16) -> io::Result<PortStatus> {
        let local: SocketAddr = match self.target {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(SocketAddr::new(self.target, port)).await?;

        let payload = probe_for_port(port);
        let mut buf = [0u8; 1024];

        for attempt in 0..self.retries {
            socket.send(payload).await?;

            match timeout(self.timeout, socket.recv(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => return Ok(PortStatus::Open),
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    return Ok(PortStatus::Closed)
                }
                _ => {}
            }

            if attempt + 1 < self.retries {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }

        Ok(PortStatus::OpenFiltered)
    }
}

#[async_trait]
impl Scanner for UdpScanner {
    fn scan_type(&self) -> ScanType {
        ScanType::Udp
    }

    fn target(&self) -> IpAddr {
        self.target
    }

    async fn scan_port(&self, port: Port) -> PortResult {
        let status = self
            .probe(port.as_u16())
            .await
            .unwrap_or(PortStatus::Filtered);
        PortResult::new(
            self.target,
            port,
            status,
            get_service_description(port.as_u16()),
        )
    }
}

fn probe_for_port(port: u16) -> &'static [u8] {
    UDP_PROBES
        .iter()
        .find(|(p, _)| *p == port)
        .map_or(DEFAULT_PROBE, |(_, payload)| *payload)
}

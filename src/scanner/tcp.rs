//! TCP connect scanner.
//!
//! Completes the full handshake through the OS socket API, so it needs no
//! privileges. Refused connections are closed ports; timeouts and
//! unreachable errors are reported as filtered.

use crate::banner::grab_banner_from_stream;
use crate::error::ScanError;
use crate::scanner::traits::{PortResult, PortStatus, ScanType, Scanner};
use crate::services::get_service_description;
use crate::types::Port;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub struct TcpConnectScanner {
    target: IpAddr,
    timeout: Duration,
    grab_banners: bool,
}

impl TcpConnectScanner {
    pub fn new(target: IpAddr, timeout: Duration, grab_banners: bool) -> Self {
        Self {
            target,
            timeout,
            grab_banners,
        }
    }

    async fn attempt_connect(&self, addr: SocketAddr) -> Result<TcpStream, ScanError> {
        match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                Err(ScanError::ConnectionRefused)
            }
            Ok(Err(e)) => {
                let message = e.to_string().to_lowercase();
                if message.contains("host") && message.contains("unreachable") {
                    Err(ScanError::HostUnreachable)
                } else if message.contains("unreachable") {
                    Err(ScanError::NetworkUnreachable(e.to_string()))
                } else {
                    Err(ScanError::ConnectionFailed(e.to_string()))
                }
            }
            Err(_) => Err(ScanError::Timeout),
        }
    }
}

#[async_trait]
impl Scanner for TcpConnectScanner {
    fn scan_type(&self) -> ScanType {
        ScanType::Tcp
    }

    fn target(&self) -> IpAddr {
        self.target
    }

    async fn scan_port(&self, port: Port) -> PortResult {
        let port_num = port.as_u16();
        let service = get_service_description(port_num);
        let start = Instant::now();

        match self
            .attempt_connect(SocketAddr::new(self.target, port_num))
            .await
        {
            Ok(stream) => {
                let elapsed = start.elapsed().as_millis() as u64;
                let banner = if self.grab_banners {
                    grab_banner_from_stream(stream, port_num, self.timeout).await
                } else {
                    None
                };

                PortResult::new(self.target, port, PortStatus::Open, service)
                    .with_banner(banner)
                    .with_response_time(elapsed)
            }
            Err(ScanError::Timeout)
            | Err(ScanError::HostUnreachable)
            | Err(ScanError::NetworkUnreachable(_)) => {
                PortResult::new(self.target, port, PortStatus::Filtered, service)
            }
            Err(_) => PortResult::new(self.target, port, PortStatus::Closed, service),
        }
    }
}

//! Scanner module: the native scan engine and its per-host probers.
//!
//! [`NativeEngine`] resolves the target expression, expands the port
//! specification and fans probes out with bounded concurrency. It covers
//! TCP connect and UDP probing; the raw-packet techniques are reported as
//! unsupported so the task fails cleanly instead of silently degrading.

pub mod rate_limiter;
pub mod tcp;
pub mod traits;
pub mod udp;

use crate::error::ScanError;
use crate::types::{Port, PortSpec, ScanTarget, TargetSpec};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::debug;

pub use rate_limiter::RateLimiter;
pub use tcp::TcpConnectScanner;
pub use traits::{
    BoxedScanner, PortResult, PortStatus, ScanEngine, ScanOptions, ScanType, Scanner,
};
pub use udp::UdpScanner;

/// Built-in engine backed by OS sockets.
#[derive(Debug, Clone, Default)]
pub struct NativeEngine {
    rate_limiter: Option<RateLimiter>,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pace probes to at most `rate` per second across every scan this
    /// engine runs. A rate of 0 disables pacing.
    pub fn with_rate_limit(mut self, rate: u32) -> Self {
        self.rate_limiter = RateLimiter::per_second(rate);
        self
    }

    fn build_scanner(
        &self,
        target: &ScanTarget,
        options: &ScanOptions,
    ) -> Result<BoxedScanner, ScanError> {
        match options.scan_type {
            ScanType::Tcp => {
                let grab_banners = options.enable_service && options.version_intensity > 0;
                Ok(Box::new(TcpConnectScanner::new(
                    target.ip,
                    options.timeout,
                    grab_banners,
                )))
            }
            ScanType::Udp => Ok(Box::new(UdpScanner::new(target.ip, options.timeout))),
            other => Err(ScanError::UnsupportedScanType(other)),
        }
    }
}

#[async_trait]
impl ScanEngine for NativeEngine {
    async fn scan(&self, options: &ScanOptions) -> Result<Vec<PortResult>, ScanError> {
        let ports = options.ports.parse::<PortSpec>()?.to_ports();
        let targets = TargetSpec::parse(&options.target)?.resolve().await?;

        if options.enable_os || options.guess_os {
            debug!(target = %options.target, "OS detection requested but not supported by the native engine");
        }

        let scanners = targets
            .iter()
            .map(|target| self.build_scanner(target, options).map(Arc::from))
            .collect::<Result<Vec<Arc<dyn Scanner>>, _>>()?;

        debug!(
            target = %options.target,
            hosts = scanners.len(),
            ports = ports.len(),
            scan_type = %options.scan_type,
            "starting native scan"
        );

        let probes: Vec<(Arc<dyn Scanner>, Port)> = scanners
            .iter()
            .flat_map(|scanner| ports.iter().map(move |&port| (Arc::clone(scanner), port)))
            .collect();

        let limiter = self.rate_limiter.clone();
        let probe_futures: Vec<_> = probes
            .into_iter()
            .map(|(scanner, port): (Arc<dyn Scanner>, Port)| {
                let limiter = limiter.clone();
                async move {
                    if let Some(limiter) = limiter {
                        limiter.wait().await;
                    }
                    scanner.scan_port(port).await
                }
            })
            .collect();
        let mut results: Vec<PortResult> = stream::iter(probe_futures)
            .buffer_unordered(options.workers.max(1))
            .collect()
            .await;

        results.sort_by(|a, b| (a.host, a.port).cmp(&(b.host, b.port)));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn options(target: &str, ports: &str, scan_type: ScanType) -> ScanOptions {
        ScanOptions {
            target: target.to_string(),
            ports: ports.to_string(),
            scan_type,
            timeout: Duration::from_millis(500),
            workers: 16,
            enable_service: false,
            enable_os: false,
            version_intensity: 7,
            guess_os: false,
            limit_os_scan: false,
        }
    }

    #[tokio::test]
    async fn test_tcp_scan_reports_every_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        tokio::spawn(async move { while listener.accept().await.is_ok() {} });

        let engine = NativeEngine::new();
        let results = engine
            .scan(&options("127.0.0.1", &format!("1,{}", open), ScanType::Tcp))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        let found = results.iter().find(|r| r.port.as_u16() == open).unwrap();
        assert_eq!(found.status, PortStatus::Open);
    }

    #[tokio::test]
    async fn test_raw_scan_types_are_unsupported() {
        let engine = NativeEngine::new();
        let err = engine
            .scan(&options("127.0.0.1", "80", ScanType::Syn))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedScanType(ScanType::Syn)));
    }

    #[tokio::test]
    async fn test_bad_ports_fail_before_probing() {
        let engine = NativeEngine::new().with_rate_limit(100);
        let err = engine
            .scan(&options("127.0.0.1", "80-20", ScanType::Tcp))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidPorts(_)));
    }
}

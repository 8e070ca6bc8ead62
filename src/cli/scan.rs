//! Scan subcommand implementation.
//!
//! Runs one scan in-process through the same executor the server uses and
//! prints the rendered report.

use crate::error::CliResult;
use crate::orchestrator::ScanExecutor;
use crate::output;
use crate::render::{FormatRenderer, OutputFormat};
use crate::scanner::{NativeEngine, ScanType};
use crate::task::ScanRequest;
use crate::types::{PortSpec, TaskId};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Scan a target for open ports.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Target to scan (IP, hostname, or CIDR notation)
    ///
    /// Examples:
    ///   192.168.1.1        Single IP address
    ///   example.com        Hostname
    ///   192.168.1.0/24     CIDR range
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Ports to scan (e.g., "80", "80,443", "1-1000", "22,80,443,8000-9000")
    #[arg(short, long, default_value = "1-1000")]
    pub ports: String,

    /// Scan type to use
    #[arg(short = 's', long = "scan-type", value_enum, default_value = "tcp")]
    pub scan_type: ScanType,

    /// Output format for results
    #[arg(short = 'o', long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Pretty-print the report
    #[arg(long)]
    pub pretty: bool,

    /// Per-probe timeout in milliseconds
    #[arg(short = 't', long, default_value = "5000")]
    pub timeout: u64,

    /// Maximum probes in flight
    #[arg(short = 'w', long, default_value = "100")]
    pub workers: usize,

    /// Grab service banners from open TCP ports
    #[arg(long = "service")]
    pub service: bool,

    /// Version probe intensity (0-9)
    #[arg(short = 'i', long = "intensity", default_value = "7")]
    pub intensity: i32,

    /// Rate limit in probes per second (0 = unlimited)
    #[arg(short = 'r', long = "rate", default_value = "0")]
    pub rate_limit: u32,

    /// Write the report to a file instead of stdout
    #[arg(short = 'f', long = "output-file", value_name = "PATH")]
    pub output_file: Option<PathBuf>,
}

impl ScanCommand {
    /// The request this invocation describes, before validation.
    pub fn request(&self) -> ScanRequest {
        let mut request = ScanRequest::new(&self.target, &self.ports);
        request.scan_type = self.scan_type;
        request.timeout = Duration::from_millis(self.timeout);
        request.workers = self.workers;
        request.output_format = self.format;
        request.pretty_output = self.pretty;
        request.enable_service = self.service;
        request.version_intensity = self.intensity;
        request
    }

    /// Execute the scan command.
    pub async fn execute(&self, quiet: bool) -> CliResult<()> {
        let request = self.request().validate()?;

        if !quiet && !matches!(request.scan_type, ScanType::Tcp | ScanType::Udp) {
            output::print_warning(&format!(
                "{} scans need raw sockets, which the native engine does not use; the scan will fail",
                request.scan_type
            ));
        }

        let interactive = !quiet && self.output_file.is_none() && self.format == OutputFormat::Text;
        if interactive {
            let ports = request
                .ports
                .parse::<PortSpec>()
                .map(|spec| spec.len_hint())
                .unwrap_or_default();
            output::print_scan_header(&request.target, request.scan_type.as_str(), ports);
        }

        let spinner = (!quiet).then(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message(format!("scanning {}", request.target));
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        });

        let engine = NativeEngine::new().with_rate_limit(self.rate_limit);
        let executor = ScanExecutor::new(Arc::new(engine), Arc::new(FormatRenderer));
        let outcome = executor.execute(TaskId::new(), &request).await;

        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        let result = outcome?;

        match &self.output_file {
            Some(path) => {
                std::fs::write(path, &result.result)?;
                if !quiet {
                    output::print_success(&format!("Report written to {}", path.display()));
                }
            }
            None => {
                print!("{}", result.result);
                if !result.result.ends_with('\n') {
                    println!();
                }
                if interactive {
                    let elapsed = result.end_time - result.start_time;
                    output::print_info(&format!(
                        "Scan finished in {:.2}s",
                        elapsed.num_milliseconds() as f64 / 1000.0
                    ));
                }
            }
        }

        Ok(())
    }
}

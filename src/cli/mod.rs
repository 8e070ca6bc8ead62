//! CLI subcommand definitions and handlers.
//!
//! - `rocketscan serve` - Run the HTTP scan job server
//! - `rocketscan scan <target>` - Scan a target once and print the report

mod scan;
mod serve;

pub use scan::ScanCommand;
pub use serve::ServeCommand;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rocketscan - A port scanner with an HTTP job server.
///
/// Scans run either directly from the command line or as jobs submitted
/// to the server, which queues them, runs a bounded number at a time and
/// keeps their results in Redis or in memory.
#[derive(Parser, Debug)]
#[command(name = "rocketscan")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A fast port scanner and scan job server", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a server configuration file (JSON)
    #[arg(long, global = true, value_name = "PATH", env = "ROCKETSCAN_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scan job API server
    #[command(alias = "api")]
    Serve(ServeCommand),

    /// Scan a target for open ports
    #[command(alias = "s")]
    Scan(ScanCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::OutputFormat;
    use crate::scanner::ScanType;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_arguments() {
        let cli = Cli::try_parse_from([
            "rocketscan", "scan", "10.0.0.0/30", "-p", "22,80", "-s", "udp", "-o", "xml", "--pretty",
        ])
        .unwrap();
        let Commands::Scan(scan) = cli.command else {
            panic!("expected scan command");
        };
        assert_eq!(scan.target, "10.0.0.0/30");
        assert_eq!(scan.ports, "22,80");
        assert_eq!(scan.scan_type, ScanType::Udp);
        assert_eq!(scan.format, OutputFormat::Xml);
        assert!(scan.pretty);
    }

    #[test]
    fn test_connect_alias() {
        let cli = Cli::try_parse_from(["rocketscan", "scan", "localhost", "-s", "connect"]).unwrap();
        let Commands::Scan(scan) = cli.command else {
            panic!("expected scan command");
        };
        assert_eq!(scan.scan_type, ScanType::Tcp);
    }

    #[test]
    fn test_serve_arguments() {
        let cli = Cli::try_parse_from([
            "rocketscan",
            "serve",
            "--port",
            "9000",
            "--redis-addr",
            "",
            "--max-concurrency",
            "4",
            "--allow-inmemory",
        ])
        .unwrap();
        let Commands::Serve(serve) = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(serve.port, Some(9000));
        assert_eq!(serve.redis_addr.as_deref(), Some(""));
        assert_eq!(serve.max_concurrency, Some(4));
        assert!(serve.allow_inmemory);
    }
}

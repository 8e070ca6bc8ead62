use anyhow::{Context, Result};
use clap::Parser;
use rocketscan::cli::{Cli, Commands};
use rocketscan::output;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match &cli.command {
        Commands::Serve(serve) => {
            if let Err(err) = serve.execute(cli.config.as_deref()).await {
                tracing::error!(error = %err, "server failed to start or stopped abnormally");
                return Err(err).context("rocketscan serve failed");
            }
        }
        Commands::Scan(scan) => {
            if let Err(err) = scan.execute(cli.quiet).await {
                output::print_error(&err.to_string());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the level follows `--verbose` / `--quiet`.
fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

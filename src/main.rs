//! Main entry point for the vuln-data-downloader CLI

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use vuln_data_downloader::cli::Cli;
use vuln_data_downloader::shutdown::{self, ShutdownCoordinator};

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // LOG_FORMAT=json switches to machine-readable output
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vuln_data_downloader=info"));

    // stdout stays free for the user; logs go to stderr
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    shutdown::install_signal_handler(shutdown.clone());

    if let Err(e) = cli.execute(shutdown).await {
        let code = e.exit_code();
        error!("Export failed: {:#}", anyhow::Error::new(e));
        std::process::exit(code);
    }
}

use std::path::PathBuf;

use clap::Parser;

use authentication_proxy::config::load_config;
use authentication_proxy::lifecycle::startup;
use authentication_proxy::observability::init_logging;

#[derive(Parser)]
#[command(name = "authentication-proxy")]
#[command(about = "Authenticating reverse proxy for a single upstream", long_about = None)]
struct Cli {
    /// Path to config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        upstream = %config.upstream,
        bind_address = %config.listener.bind_address,
        max_concurrent_requests = config.admission.max_concurrent_requests,
        queue_timeout_ms = config.admission.queue_timeout_ms,
        "Configuration loaded"
    );

    if cli.check {
        println!("configuration OK");
        return Ok(());
    }

    startup::run(config).await
}

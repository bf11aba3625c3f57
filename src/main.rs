//! Velocity Gateway
//!
//! HTTP reverse proxy with round-robin target selection and failover.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http server ──▶ dispatcher ──▶ target forwarder ──▶ Target
//!                (axum, ids,     (start pos,    (URI rewrite,
//!                 timeout)        failover,      pooled client)
//!                                 outcomes)
//!
//!     Cross-cutting: config, health checks, observability, lifecycle, admin API
//! ```

use std::path::PathBuf;

use clap::Parser;

use velocity_gateway::config::{self, ConfigSource, TargetConfig};
use velocity_gateway::observability::init_logging;

#[derive(Parser)]
#[command(name = "velocity-gateway")]
#[command(about = "HTTP reverse proxy with round-robin failover", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Target URL; repeat to replace the configured target list
    #[arg(short, long = "target")]
    targets: Vec<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (mut config, source) = config::load_config_or_default(&args.config)?;

    if !args.targets.is_empty() {
        config.targets = args.targets.iter().map(TargetConfig::new).collect();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(&config.logging);

    if source == ConfigSource::Defaults {
        tracing::warn!(
            config = %args.config.display(),
            "Config file not found; using built-in defaults"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        source = source.as_str(),
        bind_address = %config.server.bind_address(),
        targets = config.targets.len(),
        "velocity-gateway starting"
    );

    velocity_gateway::lifecycle::run(config).await?;
    Ok(())
}

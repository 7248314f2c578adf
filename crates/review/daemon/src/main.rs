//! Review daemon
//!
//! `reviewd` serves the deliverable review engine over HTTP:
//! - Deliverable and version registration
//! - Multi-level approval workflows with revision rounds
//! - Checklist gating before final approval
//! - Event streaming and a verifiable audit trail

use anyhow::Context;
use clap::Parser;
use review_daemon::{DaemonConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Review daemon CLI
#[derive(Parser)]
#[command(name = "reviewd")]
#[command(about = "Deliverable revision and approval workflow daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "REVIEW_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "REVIEW_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level, overrides the configuration file
    #[arg(long, env = "REVIEW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "REVIEW_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        DaemonConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    // CLI args win over file and environment
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .with_context(|| format!("invalid listen address: {listen}"))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        "Starting reviewd"
    );

    let server = Server::new(config).context("failed to build review engine")?;
    server.run().await.context("server terminated with an error")
}

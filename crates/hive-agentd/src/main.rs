mod cli;
mod daemon;
mod logging;
mod signals;
mod worker;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hive_core::{HiveConfig, process::current_pid};
use hive_observe::logger_init;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = HiveConfig::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    config.validate()?;
    let config = Arc::new(config);

    let logger = match &cli.command {
        Command::Daemon => logging::daemon_logger(&config.logging)?,
        Command::Worker(args) => logging::worker_logger(&config.logging, current_pid(), &args.identity)?,
    };
    logger_init(&logger)?;

    let shutdown = CancellationToken::new();
    signals::cancel_on_termination(shutdown.clone());

    match cli.command {
        Command::Daemon => {
            info!(target: "hive.agentd", name = %config.daemon_name, "starting daemon");
            daemon::run(&cli.config, config, shutdown).await
        }
        Command::Worker(args) => {
            info!(target: "hive.agentd", identity = %args.identity, platform = %args.platform, "starting worker");
            worker::run(args, config, shutdown).await
        }
    }
}

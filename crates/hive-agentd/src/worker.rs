use std::sync::Arc;

use anyhow::Context;
use hive_core::{HiveConfig, PortAllocator, process::current_pid};
use hive_worker::{PlatformRegistry, Worker, WorkerOptions, WorkerSetup};
use tokio_util::sync::CancellationToken;

use crate::cli::WorkerArgs;

/// Serve one device until the daemon dies or `shutdown` fires.
pub async fn run(
    args: WorkerArgs,
    config: Arc<HiveConfig>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mind = hive_mind::connect(&config.network).context("failed to build registry client")?;
    let setup = WorkerSetup {
        identity: args.identity.clone(),
        device_id: args.device_id,
        ports: PortAllocator::from_ports(args.ports),
        attributes: args.attributes,
        config: config.clone(),
    };
    let platform = PlatformRegistry::builtin().worker(&args.platform, setup)?;

    let opts = WorkerOptions {
        identity: args.identity,
        parent_pid: args.parent_pid,
        hive_id: args.hive_id,
        pid: current_pid(),
    };
    let mut worker = Worker::new(config, mind, platform, opts);
    worker.register().await;
    worker.run(shutdown).await;
    Ok(())
}

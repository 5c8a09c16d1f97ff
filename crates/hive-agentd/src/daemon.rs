use std::{ffi::OsString, path::Path, sync::Arc};

use anyhow::Context;
use hive_core::{
    HiveConfig, HiveContext, OsProcessControl, Register, Supervision, process::current_pid,
    register_hive,
};
use hive_worker::PlatformRegistry;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Register the hive, then reconcile devices until `shutdown` fires.
pub async fn run(
    config_path: &Path,
    config: Arc<HiveConfig>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mind = hive_mind::connect(&config.network).context("failed to build registry client")?;
    let hive_id = register_hive(mind.as_ref(), &config).await;

    let exe = std::env::current_exe().context("failed to locate own executable")?;
    let processes = OsProcessControl::new(exe).with_base_args([
        OsString::from("--config"),
        config_path.as_os_str().to_owned(),
    ]);
    let supervision = Supervision {
        processes: Arc::new(processes),
        pids_dir: config.logging.pids_dir().to_path_buf(),
        parent_pid: current_pid(),
        hive_id,
    };

    let controllers = PlatformRegistry::builtin().controllers(&config)?;
    let ctx = HiveContext {
        config,
        mind,
        supervision,
    };
    let mut register = Register::new(ctx, controllers)?;

    info!(target: "hive.agentd", pid = current_pid(), "hive daemon running");
    register.run(shutdown).await;
    Ok(())
}

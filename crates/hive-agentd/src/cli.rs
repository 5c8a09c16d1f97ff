use std::{collections::BTreeMap, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use hive_core::{Port, config::DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "hive-agentd")]
#[command(version)]
#[command(about = "Device farm agent: supervises device workers that run test jobs")]
pub struct Cli {
    /// Path to the hive configuration file.
    #[arg(long, global = true, env = "HIVE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect devices and supervise one worker per device.
    Daemon,

    /// Serve a single device; spawned by the daemon.
    Worker(WorkerArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct WorkerArgs {
    /// Platform tag of the device.
    #[arg(long)]
    pub platform: String,

    /// Unique identity of the device, e.g. `Shell-1`.
    #[arg(long)]
    pub identity: String,

    /// Raw device id as reported by the controller.
    #[arg(long)]
    pub device_id: String,

    /// Ports assigned to the device (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub ports: Vec<Port>,

    /// Pid of the supervising daemon.
    #[arg(long)]
    pub parent_pid: u32,

    /// Registry id of the hive.
    #[arg(long)]
    pub hive_id: Option<String>,

    /// Device attributes as a JSON object of strings.
    #[arg(long, value_parser = parse_attributes, default_value = "{}")]
    pub attributes: BTreeMap<String, String>,
}

fn parse_attributes(raw: &str) -> Result<BTreeMap<String, String>, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid attributes: {e}"))
}

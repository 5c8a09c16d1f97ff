//! Hive configuration, loaded from a JSON file.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::debug;

use crate::{controller::ControllerOptions, error::CoreError, ports::PortAllocator};

pub const DEFAULT_CONFIG_PATH: &str = "./config/hive.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
    /// Process name stub of the daemon.
    pub daemon_name: String,
    /// Registered hostname; the system hostname when unset.
    pub name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub location: Option<String>,
    pub building: Option<String>,
    pub logging: LoggingConfig,
    pub timings: TimingsConfig,
    pub ports: Option<PortsConfig>,
    pub network: NetworkConfig,
    pub controllers: BTreeMap<String, ControllerOptions>,
    /// platform -> diagnostic component -> settings
    pub diagnostics: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    pub execution: ExecutionConfig,
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            daemon_name: "HIVE".into(),
            name: None,
            brand: None,
            model: None,
            location: None,
            building: None,
            logging: LoggingConfig::default(),
            timings: TimingsConfig::default(),
            ports: None,
            network: NetworkConfig::default(),
            controllers: BTreeMap::new(),
            diagnostics: BTreeMap::new(),
            execution: ExecutionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    /// Protect sentinels live here; defaults to `directory`.
    pub pids: Option<PathBuf>,
    /// Root of the per-job workspaces.
    pub home: PathBuf,
    pub homes_to_keep: usize,
    /// Daemon log file name inside `directory`.
    pub main_filename: Option<String>,
    pub main_level: String,
    pub console_level: Option<String>,
    pub worker_level: String,
    /// `text`, `json` or `journald`.
    pub format: String,
    /// Level of registry-side log entries cleared after every loop.
    pub hm_logs_to_delete: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            pids: None,
            home: PathBuf::from("workspaces"),
            homes_to_keep: 5,
            main_filename: None,
            main_level: "info".into(),
            console_level: Some("info".into()),
            worker_level: "info".into(),
            format: "text".into(),
            hm_logs_to_delete: "info".into(),
        }
    }
}

impl LoggingConfig {
    pub fn pids_dir(&self) -> &Path {
        self.pids.as_deref().unwrap_or(&self.directory)
    }

    pub fn main_log_path(&self) -> Option<PathBuf> {
        self.main_filename.as_ref().map(|f| self.directory.join(f))
    }

    pub fn worker_log_path(&self, pid: u32, identity: &str) -> PathBuf {
        self.directory.join(format!("{pid}.{identity}.log"))
    }

    pub fn queue_snapshot_path(&self, pid: u32) -> PathBuf {
        self.directory.join(format!("{pid}.queues.json"))
    }
}

/// Loop intervals, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingsConfig {
    pub controller_loop_interval: u64,
    pub worker_loop_interval: u64,
    pub stats_update_interval: Option<u64>,
    pub script_poll_interval: u64,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            controller_loop_interval: 5,
            worker_loop_interval: 5,
            stats_update_interval: None,
            script_poll_interval: 30,
        }
    }
}

impl TimingsConfig {
    pub fn controller_loop(&self) -> Duration {
        Duration::from_secs(self.controller_loop_interval)
    }

    pub fn worker_loop(&self) -> Duration {
        Duration::from_secs(self.worker_loop_interval)
    }

    pub fn stats_update(&self) -> Option<Duration> {
        self.stats_update_interval
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn script_poll(&self) -> Duration {
        Duration::from_secs(self.script_poll_interval)
    }
}

/// Either an explicit `list` or a `minimum..=maximum` range.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    pub minimum: Option<u16>,
    pub maximum: Option<u16>,
    pub list: Option<Vec<u16>>,
}

impl PortsConfig {
    pub fn allocator(&self) -> Result<PortAllocator, CoreError> {
        if let Some(list) = &self.list {
            return Ok(PortAllocator::from_ports(list.iter().copied()));
        }
        match (self.minimum, self.maximum) {
            (Some(min), Some(max)) => {
                PortAllocator::from_range(min, max).map_err(|e| CoreError::Config(e.to_string()))
            }
            (None, None) => Ok(PortAllocator::empty()),
            _ => Err(CoreError::Config(
                "ports needs both minimum and maximum".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Registry base URL; offline mode when unset.
    pub hive_mind: Option<String>,
    /// Job scheduler base URL.
    pub scheduler: Option<String>,
    /// Client certificate (PEM) for both services.
    pub cert: Option<PathBuf>,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hive_mind: None,
            scheduler: None,
            cert: None,
            timeout: 30,
        }
    }
}

/// Toolchain variables of the hive's own runtime that must not leak into job scripts.
pub const DEFAULT_UNSET_ENV: &[&str] =
    &["BUNDLE_GEMFILE", "BUNDLE_BIN_PATH", "GEM_PATH", "RUBYOPT", "rvm_"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Inherited variables removed from every job script.
    pub unset_env: Vec<String>,
    /// Shell file sourced at the top of every job script.
    pub script_helper: Option<PathBuf>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            unset_env: DEFAULT_UNSET_ENV.iter().map(|v| v.to_string()).collect(),
            script_helper: None,
        }
    }
}

impl HiveConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        let cfg = Self::from_json(&raw)?;
        debug!(target: "hive.core.config", path = %path.display(), "configuration loaded");
        Ok(cfg)
    }

    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        let cfg: HiveConfig =
            serde_json::from_str(raw).map_err(|e| CoreError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(ports) = &self.ports {
            ports.allocator()?;
        }
        if self.timings.controller_loop_interval == 0 || self.timings.worker_loop_interval == 0 {
            return Err(CoreError::Config("loop intervals must be positive".into()));
        }
        if self.timings.script_poll_interval == 0 {
            return Err(CoreError::Config(
                "script_poll_interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Shared port pool for the whole fleet.
    pub fn port_pool(&self) -> Result<PortAllocator, CoreError> {
        self.ports
            .as_ref()
            .map_or_else(|| Ok(PortAllocator::empty()), PortsConfig::allocator)
    }

    /// Diagnostic components configured for `platform`.
    pub fn diagnostics_for(&self, platform: &str) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.diagnostics.get(platform)
    }

    /// `(warning, error)` load-average thresholds from `diagnostics.hive.load`.
    pub fn load_thresholds(&self) -> Option<(f64, f64)> {
        let load = self.diagnostics.get("hive")?.get("load")?;
        Some((load.get("warning")?.as_f64()?, load.get("error")?.as_f64()?))
    }
}

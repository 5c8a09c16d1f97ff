//! Device discovery, one controller per platform.

mod shell;
pub use shell::{SHELL_PLATFORM, ShellController};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::device::Device;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("{platform} detection failed: {reason}")]
    Failed { platform: String, reason: String },
}

/// Per-platform controller settings from the `controllers` config section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ControllerOptions {
    /// Ports handed to each device of this platform.
    #[serde(default)]
    pub port_range_size: usize,
    /// Platform specific keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ControllerOptions {
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(serde_json::Value::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Discovers the devices of one platform.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Platform tag, e.g. `"shell"`.
    fn platform(&self) -> &str;

    /// Number of ports reserved for every newly detected device.
    fn port_range_size(&self) -> usize;

    /// Currently present devices. Called once per reconciliation pass.
    async fn detect(&self) -> Result<Vec<Device>, DetectionError>;
}

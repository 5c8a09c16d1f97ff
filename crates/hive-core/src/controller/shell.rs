use async_trait::async_trait;
use hive_model::DeviceStatus;
use tracing::{debug, info};

use super::{Controller, ControllerOptions, DetectionError};
use crate::device::Device;

pub const SHELL_PLATFORM: &str = "shell";

/// Virtual devices that run jobs directly on the hive host.
///
/// `workers` in the options sets how many `Shell-<n>` devices exist.
#[derive(Debug, Clone)]
pub struct ShellController {
    workers: u64,
    port_range_size: usize,
    attributes: Vec<(String, String)>,
}

impl ShellController {
    pub fn new(options: &ControllerOptions) -> Self {
        debug!(target: "hive.core.controller", ?options, "shell controller options");
        let attributes = options
            .extra
            .iter()
            .filter(|(k, _)| k.as_str() != "workers")
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k.clone(), s.clone())),
                serde_json::Value::Number(n) => Some((k.clone(), n.to_string())),
                _ => None,
            })
            .collect();
        Self {
            workers: options.get_u64("workers").unwrap_or(0),
            port_range_size: options.port_range_size,
            attributes,
        }
    }
}

#[async_trait]
impl Controller for ShellController {
    fn platform(&self) -> &str {
        SHELL_PLATFORM
    }

    fn port_range_size(&self) -> usize {
        self.port_range_size
    }

    async fn detect(&self) -> Result<Vec<Device>, DetectionError> {
        info!(target: "hive.core.controller", workers = self.workers, "creating shell devices");
        Ok((1..=self.workers)
            .map(|i| {
                self.attributes.iter().fold(
                    Device::new(SHELL_PLATFORM, i.to_string()).with_status(DeviceStatus::Idle),
                    |d, (k, v)| d.with_attribute(k, v),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detects_configured_number_of_idle_devices() {
        let opts: ControllerOptions = serde_json::from_str(
            r#"{"workers": 3, "port_range_size": 2, "queue_prefix": "ci"}"#,
        )
        .unwrap();
        let controller = ShellController::new(&opts);
        let devices = controller.detect().await.unwrap();

        let ids: Vec<_> = devices.iter().map(|d| d.identity().to_string()).collect();
        assert_eq!(ids, ["Shell-1", "Shell-2", "Shell-3"]);
        assert!(devices.iter().all(|d| d.status == DeviceStatus::Idle));
        assert_eq!(devices[0].attributes().get("queue_prefix").map(String::as_str), Some("ci"));
        assert_eq!(controller.port_range_size(), 2);
    }

    #[tokio::test]
    async fn no_workers_means_no_devices() {
        let controller = ShellController::new(&ControllerOptions::default());
        assert!(controller.detect().await.unwrap().is_empty());
    }
}

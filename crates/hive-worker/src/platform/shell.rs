use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use hive_core::{HiveConfig, Port, PortAllocator, controller::SHELL_PLATFORM, system};
use hive_exec::ExecutionScript;
use hive_model::{DeviceDetails, Job, QueueName};
use tracing::{debug, info};

use super::{DeviceHealth, WorkerPlatform, WorkerSetup, normalize_queue_names};
use crate::{error::WorkerError, fs::JobFileSystem};

/// Jobs run directly on the hive host.
///
/// Each job gets a `TEST_SERVER_PORT` from the device's port range.
pub struct ShellPlatform {
    identity: String,
    ports: PortAllocator,
    attributes: BTreeMap<String, String>,
    config: Arc<HiveConfig>,
    status: DeviceHealth,
    test_port: Option<Port>,
}

impl ShellPlatform {
    pub fn new(setup: WorkerSetup) -> Self {
        Self {
            identity: setup.identity,
            ports: setup.ports,
            attributes: setup.attributes,
            config: setup.config,
            status: DeviceHealth::Happy,
            test_port: None,
        }
    }

    pub fn test_port(&self) -> Option<Port> {
        self.test_port
    }
}

#[async_trait]
impl WorkerPlatform for ShellPlatform {
    fn platform(&self) -> &str {
        SHELL_PLATFORM
    }

    fn mind_identifiers(&self) -> DeviceDetails {
        DeviceDetails {
            hostname: Some(format!("{}-{}", system::hostname(), self.identity)),
            brand: Some("Hive".into()),
            model: Some("Shell".into()),
            device_type: Some("Shell".into()),
            operating_system_name: Some(system::system_name().to_string()),
            operating_system_version: Some(system::system_version()),
            location: self.config.location.clone(),
            building: self.config.building.clone(),
            ..DeviceDetails::default()
        }
    }

    fn autogenerated_queues(&self) -> Vec<QueueName> {
        let prefix = self
            .attributes
            .get("queue_prefix")
            .map(String::as_str)
            .unwrap_or("");
        let mut queues = vec![format!("{prefix}{SHELL_PLATFORM}")];
        for place in [&self.config.location, &self.config.building].into_iter().flatten() {
            queues.push(format!("{prefix}{place}-{SHELL_PLATFORM}"));
        }
        normalize_queue_names(queues)
    }

    fn device_status(&self) -> DeviceHealth {
        self.status.clone()
    }

    fn set_device_status(&mut self, status: DeviceHealth) -> DeviceHealth {
        self.status = status;
        self.status.clone()
    }

    async fn pre_script(
        &mut self,
        _job: &Job,
        _fs: &JobFileSystem,
        script: &mut ExecutionScript,
    ) -> Result<(), WorkerError> {
        let port = self.ports.allocate_port()?;
        info!(target: "hive.worker.shell", port, "reserved test server port");
        script.set_env("TEST_SERVER_PORT", port.to_string());
        self.test_port = Some(port);
        self.status = DeviceHealth::Busy;
        Ok(())
    }

    fn signal_safe_post_script(&mut self, _job: &Job, _fs: &JobFileSystem) {
        if let Some(port) = self.test_port.take() {
            debug!(target: "hive.worker.shell", port, "releasing test server port");
            self.ports.release_port(port);
        }
    }
}

//! Per-platform worker behaviour and the tag -> implementation registry.

mod queues;
pub use queues::normalize_queue_names;

mod registry;
pub use registry::{ControllerFactory, PlatformRegistry, WorkerFactory};

mod shell;
pub use shell::ShellPlatform;

use std::{collections::BTreeMap, fmt, sync::Arc};

use async_trait::async_trait;
use hive_core::{HiveConfig, PortAllocator};
use hive_exec::ExecutionScript;
use hive_model::{DeviceDetails, Job, QueueName};

use crate::{error::WorkerError, fs::JobFileSystem};

/// Device health as seen by the worker before it reserves work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceHealth {
    Happy,
    Busy,
    Other(String),
}

impl fmt::Display for DeviceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceHealth::Happy => f.write_str("happy"),
            DeviceHealth::Busy => f.write_str("busy"),
            DeviceHealth::Other(s) => f.write_str(s),
        }
    }
}

/// What a worker process knows about its device at startup.
#[derive(Debug, Clone)]
pub struct WorkerSetup {
    pub identity: String,
    pub device_id: String,
    /// Port range assigned by the register.
    pub ports: PortAllocator,
    pub attributes: BTreeMap<String, String>,
    pub config: Arc<HiveConfig>,
}

/// Platform hooks around job execution.
#[async_trait]
pub trait WorkerPlatform: Send {
    fn platform(&self) -> &str;

    /// Payload identifying the device to the registry.
    fn mind_identifiers(&self) -> DeviceDetails;

    /// Queues derived from device attributes, merged with the registry's queues.
    fn autogenerated_queues(&self) -> Vec<QueueName> {
        Vec::new()
    }

    fn device_status(&self) -> DeviceHealth;

    fn set_device_status(&mut self, status: DeviceHealth) -> DeviceHealth;

    /// Runs right before the script, after the environment is built.
    async fn pre_script(
        &mut self,
        _job: &Job,
        _fs: &JobFileSystem,
        _script: &mut ExecutionScript,
    ) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn post_script(&mut self, job: &Job, fs: &JobFileSystem) -> Result<(), WorkerError> {
        self.signal_safe_post_script(job, fs);
        Ok(())
    }

    /// The part of `post_script` that is safe on the termination path: quick and infallible.
    fn signal_safe_post_script(&mut self, _job: &Job, _fs: &JobFileSystem) {}

    /// Runs before uploads when the job ends in error.
    async fn after_error(&mut self, _job: &Job, _fs: &JobFileSystem) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Device cleanup after every job.
    fn cleanup(&mut self) {}
}

//! Contract with the remote device and job registry ("the mind").

use std::path::Path;

use async_trait::async_trait;
use hive_model::{
    DeviceDetails, Job, JobId, QueueName, RegisteredDevice, ReservationDetails, Statistic,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MindError {
    #[error("registry is not configured")]
    Offline,

    #[error("request failed: {0}")]
    Request(String),

    #[error("registry rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Operations the hive consumes from the registry and the job scheduler.
///
/// Every call is fallible and callers treat failures as transient: they log and carry on.
#[async_trait]
pub trait Mind: Send + Sync {
    /// Register a device (or the hive itself) and return its registry id.
    async fn register(&self, details: &DeviceDetails) -> Result<RegisteredDevice, MindError>;

    async fn update_os_version(&self, device_id: &str, version: &str) -> Result<(), MindError>;

    /// Heartbeat for a set of devices.
    async fn poll(&self, device_ids: &[String]) -> Result<(), MindError>;

    /// Queues the registry assigned to a device.
    async fn hive_queues(&self, device_id: &str) -> Result<Vec<QueueName>, MindError>;

    /// Reserve one job from any of `queues`. `Ok(None)` means nothing is waiting.
    async fn reserve_job(
        &self,
        queues: &[QueueName],
        details: &ReservationDetails,
    ) -> Result<Option<Job>, MindError>;

    async fn push_statistics(&self, device_id: &str, stats: &[Statistic])
    -> Result<(), MindError>;

    /// Drop log entries of `component` at or below `level` kept by the registry.
    async fn clear_logs(&self, device_id: &str, component: &str, level: &str)
    -> Result<(), MindError>;

    /// Announce which device is about to run the job.
    async fn prepare_job(&self, job: &JobId, device_id: &str) -> Result<(), MindError>;

    async fn start_job(&self, job: &JobId) -> Result<(), MindError>;

    async fn end_job(&self, job: &JobId, exit_code: Option<i32>) -> Result<(), MindError>;

    async fn complete_job(&self, job: &JobId) -> Result<(), MindError>;

    async fn error_job(&self, job: &JobId, message: &str) -> Result<(), MindError>;

    async fn report_artifact(&self, job: &JobId, path: &Path) -> Result<(), MindError>;
}

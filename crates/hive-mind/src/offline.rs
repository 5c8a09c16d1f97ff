use std::path::Path;

use async_trait::async_trait;
use hive_core::{Mind, MindError};
use hive_model::{
    DeviceDetails, Job, JobId, QueueName, RegisteredDevice, ReservationDetails, Statistic,
};
use tracing::debug;

/// Registry stand-in: registration fails softly, no queues are assigned and no jobs arrive.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineMind;

#[async_trait]
impl Mind for OfflineMind {
    async fn register(&self, _details: &DeviceDetails) -> Result<RegisteredDevice, MindError> {
        Err(MindError::Offline)
    }

    async fn update_os_version(&self, _device_id: &str, _version: &str) -> Result<(), MindError> {
        Ok(())
    }

    async fn poll(&self, _device_ids: &[String]) -> Result<(), MindError> {
        Ok(())
    }

    async fn hive_queues(&self, _device_id: &str) -> Result<Vec<QueueName>, MindError> {
        Ok(Vec::new())
    }

    async fn reserve_job(
        &self,
        queues: &[QueueName],
        _details: &ReservationDetails,
    ) -> Result<Option<Job>, MindError> {
        debug!(target: "hive.mind.offline", ?queues, "offline, no job reserved");
        Ok(None)
    }

    async fn push_statistics(
        &self,
        _device_id: &str,
        _stats: &[Statistic],
    ) -> Result<(), MindError> {
        Ok(())
    }

    async fn clear_logs(
        &self,
        _device_id: &str,
        _component: &str,
        _level: &str,
    ) -> Result<(), MindError> {
        Ok(())
    }

    async fn prepare_job(&self, _job: &JobId, _device_id: &str) -> Result<(), MindError> {
        Ok(())
    }

    async fn start_job(&self, _job: &JobId) -> Result<(), MindError> {
        Ok(())
    }

    async fn end_job(&self, _job: &JobId, _exit_code: Option<i32>) -> Result<(), MindError> {
        Ok(())
    }

    async fn complete_job(&self, _job: &JobId) -> Result<(), MindError> {
        Ok(())
    }

    async fn error_job(&self, _job: &JobId, _message: &str) -> Result<(), MindError> {
        Ok(())
    }

    async fn report_artifact(&self, _job: &JobId, _path: &Path) -> Result<(), MindError> {
        Ok(())
    }
}
